//! Candidate source resolution for a selected camera.

use super::{CandidateList, TemplateExpander};
use crate::catalog::{Camera, CatalogSource, ClientContext};
use crate::config::PlaybackConfig;

/// Builds ordered candidate lists from the catalog.
///
/// Holds only borrowed read access; resolving has no side effects.
pub struct SourceResolver<'a, C: CatalogSource + ?Sized> {
    catalog: &'a C,
    context: &'a ClientContext,
}

impl<'a, C: CatalogSource + ?Sized> SourceResolver<'a, C> {
    pub fn new(catalog: &'a C, context: &'a ClientContext) -> Self {
        Self { catalog, context }
    }

    /// Resolves the camera's candidate sources in ascending priority order.
    ///
    /// Templates that do not apply to this camera or client are skipped, as
    /// are links naming a source template missing from the catalog. Returns
    /// an empty list when the camera has no template or the template has no
    /// links.
    pub fn resolve(&self, camera: &Camera) -> CandidateList {
        let Some(template_name) = camera.camera_template.as_deref() else {
            return CandidateList::new();
        };
        if self.catalog.camera_template(template_name).is_none() {
            return CandidateList::new();
        }

        let mut links = self.catalog.source_orders(template_name);
        links.sort_by_key(|link| link.order);

        let candidates: CandidateList = links
            .into_iter()
            .filter_map(|link| {
                let Some(source) = self.catalog.source_template(&link.source_template) else {
                    tracing::warn!(
                        "Camera template {} links unknown source template {}",
                        template_name,
                        link.source_template
                    );
                    return None;
                };
                TemplateExpander::expand(source, camera, self.context)
            })
            .collect();

        tracing::debug!(
            "Resolved {} candidate source(s) for camera {}",
            candidates.len(),
            camera.name
        );
        candidates
    }

    /// Playback settings for the camera: system defaults merged with the
    /// camera template's overrides.
    pub fn playback_config(&self, camera: &Camera, defaults: &PlaybackConfig) -> PlaybackConfig {
        camera
            .camera_template
            .as_deref()
            .and_then(|name| self.catalog.camera_template(name))
            .map(|template| defaults.with_overrides(&template.playback))
            .unwrap_or_else(|| defaults.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CameraTemplate, InMemoryCatalog, SourceOrder, SourceTemplate};
    use crate::config::PlaybackOverrides;
    use crate::source::BackendKind;

    fn source(name: &str, config: &str) -> SourceTemplate {
        SourceTemplate {
            name: name.to_string(),
            label: name.to_uppercase(),
            config: config.to_string(),
            ..Default::default()
        }
    }

    fn link(source_template: &str, order: i32) -> SourceOrder {
        SourceOrder {
            camera_template: "axis".to_string(),
            source_template: source_template.to_string(),
            order,
        }
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog {
            cameras: vec![Camera {
                name: "C001".to_string(),
                encoder_address: Some("10.0.0.5".to_string()),
                camera_template: Some("axis".to_string()),
                ..Default::default()
            }],
            camera_templates: vec![CameraTemplate {
                name: "axis".to_string(),
                playback: PlaybackOverrides {
                    connect_fail_seconds: Some(3),
                    ..Default::default()
                },
            }],
            source_templates: vec![
                source("h264", "rtspsrc location=rtsp://{addr}/axis-media ! rtph264depay"),
                source("mjpeg", "http://{addr}/axis-cgi/mjpg/video.cgi"),
                source("proxy", "http://{proxy_host}/{pname}"),
                source("pattern", "videotestsrc ! videoconvert"),
            ],
            source_orders: vec![
                link("pattern", 40),
                link("mjpeg", 20),
                link("proxy", 30),
                link("h264", 10),
                link("deleted", 5),
            ],
        }
    }

    #[test]
    fn test_candidates_follow_priority_order() {
        let catalog = catalog();
        let context = ClientContext::default();
        let resolver = SourceResolver::new(&catalog, &context);

        let candidates = resolver.resolve(catalog.camera("C001").unwrap());
        let labels: Vec<&str> = candidates.iter().map(|c| c.source_label()).collect();

        // proxy has no proxy_host property and drops out
        assert_eq!(labels, vec!["H264", "MJPEG", "PATTERN"]);
        assert_eq!(candidates[0].backend_kind(), BackendKind::Pipeline);
        assert_eq!(candidates[1].backend_kind(), BackendKind::MultipartHttp);
    }

    #[test]
    fn test_context_property_enables_template() {
        let catalog = catalog();
        let context = ClientContext::default().with_property("proxy_host", "vp.example.com");
        let resolver = SourceResolver::new(&catalog, &context);

        let candidates = resolver.resolve(catalog.camera("C001").unwrap());
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[2].expanded_config(), "http://vp.example.com/C001");
    }

    #[test]
    fn test_camera_without_template_has_no_candidates() {
        let catalog = catalog();
        let context = ClientContext::default();
        let resolver = SourceResolver::new(&catalog, &context);

        let camera = Camera {
            name: "C002".to_string(),
            ..Default::default()
        };
        assert!(resolver.resolve(&camera).is_empty());

        let camera = Camera {
            name: "C003".to_string(),
            camera_template: Some("unknown".to_string()),
            ..Default::default()
        };
        assert!(resolver.resolve(&camera).is_empty());
    }

    #[test]
    fn test_playback_config_merges_template_overrides() {
        let catalog = catalog();
        let context = ClientContext::default();
        let resolver = SourceResolver::new(&catalog, &context);
        let defaults = PlaybackConfig::default();

        let config = resolver.playback_config(catalog.camera("C001").unwrap(), &defaults);
        assert_eq!(config.connect_fail_seconds, 3);
        assert_eq!(config.lost_timeout_seconds, defaults.lost_timeout_seconds);

        let orphan = Camera::default();
        assert_eq!(resolver.playback_config(&orphan, &defaults), defaults);
    }
}
