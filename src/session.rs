//! Map session: the owner of every uploaded layer and its classification.
//!
//! All mutation goes through [`MapSession`]. The host map is reached only
//! through [`MapHost`]; the session never renders or hit-tests.
//!
//! Classification requests carry a per-layer epoch. Starting a new request
//! (or resetting) advances the epoch, and a request whose epoch is no longer
//! current completes as [`ClassificationOutcome::Superseded`] without touching
//! the layer. A request that fails hands the epoch back, so an earlier
//! pending request stays current.

use std::collections::HashMap;

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    config::ViewerConfig,
    error::{ViewerError, ViewerResult},
    fields::Attributes,
    frequency::{FieldStats, compute_stats_with_limit},
    geometry::Extent,
    layer::{FeatureLayer, LayerId, LayerSummary},
    palette::Palette,
    renderer::{Legend, Renderer, build_renderer, simple_renderer},
    upload::{FeatureService, UploadPipeline, UploadSource},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationOptions {
    pub duration_ms: u32,
    pub animate: bool,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            duration_ms: 1000,
            animate: true,
        }
    }
}

/// Host map collaborator.
pub trait MapHost {
    fn add_layer(&mut self, layer: &FeatureLayer);

    fn remove_layer(&mut self, id: LayerId);

    fn go_to_extent(&mut self, extent: &Extent, options: &AnimationOptions);

    /// Called after a layer's renderer has been replaced.
    fn renderer_changed(&mut self, _id: LayerId, _renderer: &Renderer) {}

    /// Queries the attributes of every feature in `layer`. Hosts that hold no
    /// richer copy answer from the layer itself.
    fn query_features(
        &mut self,
        layer: &FeatureLayer,
        _field: &str,
    ) -> ViewerResult<Vec<Attributes>> {
        Ok(layer.attributes().cloned().collect())
    }
}

/// Host that displays nothing; used by the command line.
#[derive(Debug, Default)]
pub struct NullHost;

impl MapHost for NullHost {
    fn add_layer(&mut self, layer: &FeatureLayer) {
        debug!("Registered {} ('{}')", layer.id(), layer.title());
    }

    fn remove_layer(&mut self, id: LayerId) {
        debug!("Removed {id}");
    }

    fn go_to_extent(&mut self, extent: &Extent, _options: &AnimationOptions) {
        debug!("Extent {extent:?}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationTicket {
    pub layer: LayerId,
    pub field: String,
    epoch: u64,
    previous: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationSummary {
    pub layer: LayerId,
    pub field: String,
    pub stats: FieldStats,
    pub legend: Legend,
    pub renderer: Renderer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    Applied(Box<ClassificationSummary>),
    Superseded,
}

type UploadHandler = Box<dyn FnMut(&LayerSummary)>;
type FieldHandler = Box<dyn FnMut(&ClassificationSummary)>;

pub struct MapSession<H: MapHost> {
    host: H,
    config: ViewerConfig,
    palette: Palette,
    service: Option<Box<dyn FeatureService>>,
    layers: Vec<FeatureLayer>,
    epochs: HashMap<LayerId, u64>,
    next_layer: u64,
    animation: AnimationOptions,
    upload_handlers: Vec<UploadHandler>,
    field_handlers: Vec<FieldHandler>,
}

impl<H: MapHost> MapSession<H> {
    pub fn new(host: H, config: ViewerConfig) -> ViewerResult<Self> {
        config.validate()?;
        let palette = config.resolve_palette()?;
        Ok(Self {
            host,
            config,
            palette,
            service: None,
            layers: Vec::new(),
            epochs: HashMap::new(),
            next_layer: 0,
            animation: AnimationOptions::default(),
            upload_handlers: Vec::new(),
            field_handlers: Vec::new(),
        })
    }

    pub fn with_feature_service(mut self, service: Box<dyn FeatureService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn layers(&self) -> &[FeatureLayer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> ViewerResult<&FeatureLayer> {
        self.layers
            .iter()
            .find(|layer| layer.id() == id)
            .ok_or(ViewerError::UnknownLayer(id.0))
    }

    fn layer_position(&self, id: LayerId) -> ViewerResult<usize> {
        self.layers
            .iter()
            .position(|layer| layer.id() == id)
            .ok_or(ViewerError::UnknownLayer(id.0))
    }

    pub fn on_upload_complete(&mut self, handler: impl FnMut(&LayerSummary) + 'static) {
        self.upload_handlers.push(Box::new(handler));
    }

    pub fn on_field_selected(&mut self, handler: impl FnMut(&ClassificationSummary) + 'static) {
        self.field_handlers.push(Box::new(handler));
    }

    /// Validates, parses, and registers an upload. Either every resulting
    /// layer is registered or none is.
    pub fn upload(&mut self, source: &UploadSource) -> ViewerResult<Vec<LayerId>> {
        let mut pipeline = UploadPipeline::new(&self.config);
        if let Some(service) = self.service.as_deref() {
            pipeline = pipeline.with_service(service);
        }
        let drafts = pipeline.process(source)?;

        let mut prepared = Vec::with_capacity(drafts.len());
        for (offset, draft) in drafts.into_iter().enumerate() {
            let index = self.next_layer as usize + offset;
            let base = simple_renderer(
                draft.geometry_type,
                index,
                &self.palette,
                &self.config.symbols,
            )?;
            prepared.push((draft, base));
        }

        let mut ids = Vec::with_capacity(prepared.len());
        for (draft, base) in prepared {
            self.next_layer += 1;
            let id = LayerId(self.next_layer);
            let layer = FeatureLayer::new(id, draft, base);
            self.host.add_layer(&layer);
            info!(
                "Added {id} '{}' with {} feature(s)",
                layer.title(),
                layer.feature_count()
            );
            self.epochs.insert(id, 0);
            self.layers.push(layer);
            ids.push(id);
        }

        let extents = ids
            .iter()
            .filter_map(|id| self.layer(*id).ok().and_then(FeatureLayer::full_extent))
            .collect::<Vec<_>>();
        if let Some(extent) = Extent::combine(&extents) {
            self.host.go_to_extent(&extent, &self.animation);
        }

        for id in &ids {
            let summary = self.layer(*id)?.summary();
            for handler in &mut self.upload_handlers {
                handler(&summary);
            }
        }
        Ok(ids)
    }

    pub fn remove_layer(&mut self, id: LayerId) -> ViewerResult<FeatureLayer> {
        let position = self.layer_position(id)?;
        let layer = self.layers.remove(position);
        self.epochs.remove(&id);
        self.host.remove_layer(id);
        info!("Removed {id} '{}'", layer.title());
        Ok(layer)
    }

    pub fn zoom_to_layer(&mut self, id: LayerId) -> ViewerResult<()> {
        if let Some(extent) = self.layer(id)?.full_extent() {
            self.host.go_to_extent(&extent, &self.animation);
        }
        Ok(())
    }

    pub fn classifiable_fields(&self, id: LayerId) -> ViewerResult<Vec<String>> {
        Ok(self
            .layer(id)?
            .classifiable_fields()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Starts a classification request, superseding any earlier one for the
    /// same layer.
    pub fn begin_classification(
        &mut self,
        id: LayerId,
        field: &str,
    ) -> ViewerResult<ClassificationTicket> {
        if field.trim().is_empty() {
            return Err(ViewerError::precondition("no field selected"));
        }
        let layer = self.layer(id)?;
        match layer.field(field) {
            Some(f) if f.field_type.is_classifiable() => {}
            Some(f) => {
                return Err(ViewerError::precondition(format!(
                    "field '{field}' has type {} and cannot be classified",
                    f.field_type
                )));
            }
            None => {
                return Err(ViewerError::precondition(format!(
                    "field '{field}' does not exist on {id}"
                )));
            }
        }
        let previous = self.epochs.get(&id).copied().unwrap_or_default();
        let epoch = self.advance_epoch(id);
        debug!("Classification of {id} on '{field}' started at epoch {epoch}");
        Ok(ClassificationTicket {
            layer: id,
            field: field.to_string(),
            epoch,
            previous,
        })
    }

    /// Computes statistics and swaps the renderer for `ticket`, unless a later
    /// request for the same layer has started since.
    pub fn complete_classification(
        &mut self,
        ticket: ClassificationTicket,
    ) -> ViewerResult<ClassificationOutcome> {
        let position = self.layer_position(ticket.layer)?;
        if !self.is_current(&ticket) {
            debug!(
                "Classification of {} on '{}' superseded",
                ticket.layer, ticket.field
            );
            return Ok(ClassificationOutcome::Superseded);
        }

        let (stats, renderer, legend) = match self.prepare_classification(position, &ticket) {
            Ok(prepared) => prepared,
            Err(err) => {
                self.epochs.insert(ticket.layer, ticket.previous);
                return Err(err);
            }
        };

        let summary = ClassificationSummary {
            layer: ticket.layer,
            field: ticket.field.clone(),
            stats,
            legend: legend.clone(),
            renderer: renderer.clone(),
        };
        let layer = &mut self.layers[position];
        layer.apply_classification(renderer, legend);
        self.host.renderer_changed(ticket.layer, layer.renderer());
        info!(
            "Classified {} on '{}': {} unique value(s), {} shown",
            ticket.layer,
            ticket.field,
            summary.stats.unique_count,
            summary.legend.entries.len()
        );
        for handler in &mut self.field_handlers {
            handler(&summary);
        }
        Ok(ClassificationOutcome::Applied(Box::new(summary)))
    }

    /// Classifies `id` on `field` in one step.
    pub fn classify(&mut self, id: LayerId, field: &str) -> ViewerResult<ClassificationSummary> {
        let ticket = self.begin_classification(id, field)?;
        match self.complete_classification(ticket)? {
            ClassificationOutcome::Applied(summary) => Ok(*summary),
            ClassificationOutcome::Superseded => Err(ViewerError::precondition(
                "classification was superseded",
            )),
        }
    }

    /// Returns the layer to its single-symbol renderer and clears its legend.
    /// Pending classification requests for the layer are superseded.
    pub fn reset_classification(&mut self, id: LayerId) -> ViewerResult<()> {
        let position = self.layer_position(id)?;
        self.advance_epoch(id);
        let layer = &mut self.layers[position];
        layer.reset_classification();
        self.host.renderer_changed(id, layer.renderer());
        info!("Reset classification of {id}");
        Ok(())
    }

    fn prepare_classification(
        &mut self,
        position: usize,
        ticket: &ClassificationTicket,
    ) -> ViewerResult<(FieldStats, Renderer, Legend)> {
        let layer = &self.layers[position];
        let queried = match self.host.query_features(layer, &ticket.field) {
            Ok(rows) if !rows.is_empty() => Some(rows),
            Ok(_) => None,
            Err(err) => {
                warn!("{err}; using attributes held by {}", ticket.layer);
                None
            }
        };
        let top = self.config.top_values;
        let stats = match &queried {
            Some(rows) => compute_stats_with_limit(rows, &ticket.field, top),
            None => compute_stats_with_limit(layer.attributes(), &ticket.field, top),
        }
        .ok_or_else(|| ViewerError::precondition(format!("{} has no features", ticket.layer)))?;

        let (renderer, legend) = build_renderer(
            &stats,
            layer.geometry_type(),
            &self.palette,
            &self.config.symbols,
        )?;
        Ok((stats, renderer, legend))
    }

    fn advance_epoch(&mut self, id: LayerId) -> u64 {
        let epoch = self.epochs.entry(id).or_insert(0);
        *epoch += 1;
        *epoch
    }

    fn is_current(&self, ticket: &ClassificationTicket) -> bool {
        self.epochs.get(&ticket.layer) == Some(&ticket.epoch)
    }
}
