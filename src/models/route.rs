use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque route identifier as issued by the directions backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(String);

impl RouteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouteId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Congestion {
    Unknown,
    Low,
    Moderate,
    Heavy,
    Severe,
}

/// Per-segment traffic annotation of one leg. Entry `i` describes the segment
/// between geometry points `i` and `i + 1`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LegAnnotation {
    pub distance: Vec<f64>,
    pub duration: Vec<f64>,
    pub congestion: Vec<Congestion>,
}

impl LegAnnotation {
    pub fn total_distance(&self) -> f64 {
        self.distance.iter().sum()
    }

    pub fn total_duration(&self) -> f64 {
        self.duration.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegStep {
    pub instruction: String,
    pub distance: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    steps: Vec<LegStep>,
    geometry: Vec<GeoPoint>,
    annotation: Option<LegAnnotation>,
}

impl RouteLeg {
    pub fn new(steps: Vec<LegStep>, geometry: Vec<GeoPoint>, annotation: Option<LegAnnotation>) -> Self {
        Self {
            steps,
            geometry,
            annotation,
        }
    }

    pub fn steps(&self) -> &[LegStep] {
        &self.steps
    }

    pub fn geometry(&self) -> &[GeoPoint] {
        &self.geometry
    }

    pub fn annotation(&self) -> Option<&LegAnnotation> {
        self.annotation.as_ref()
    }

    /// Number of segments between consecutive geometry points.
    pub fn segment_count(&self) -> usize {
        self.geometry.len().saturating_sub(1)
    }

    /// Leg distance from the annotation, falling back to the steps.
    pub fn distance(&self) -> f64 {
        match &self.annotation {
            Some(annotation) if !annotation.distance.is_empty() => annotation.total_distance(),
            _ => self.steps.iter().map(|step| step.distance).sum(),
        }
    }

    pub fn duration(&self) -> f64 {
        match &self.annotation {
            Some(annotation) if !annotation.duration.is_empty() => annotation.total_duration(),
            _ => self.steps.iter().map(|step| step.duration).sum(),
        }
    }

    pub(crate) fn with_annotation(&self, annotation: LegAnnotation) -> Self {
        Self {
            steps: self.steps.clone(),
            geometry: self.geometry.clone(),
            annotation: Some(annotation),
        }
    }
}

/// A computed route. Immutable once built; a refresh yields a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    id: RouteId,
    legs: Vec<RouteLeg>,
}

impl Route {
    pub fn new(id: impl Into<RouteId>, legs: Vec<RouteLeg>) -> Self {
        Self {
            id: id.into(),
            legs,
        }
    }

    pub fn id(&self) -> &RouteId {
        &self.id
    }

    pub fn legs(&self) -> &[RouteLeg] {
        &self.legs
    }

    pub fn leg(&self, index: usize) -> Option<&RouteLeg> {
        self.legs.get(index)
    }

    pub fn distance(&self) -> f64 {
        self.legs.iter().map(RouteLeg::distance).sum()
    }

    pub fn duration(&self) -> f64 {
        self.legs.iter().map(RouteLeg::duration).sum()
    }
}

impl From<String> for RouteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Ordered routes; index 0 is the primary, the rest are alternatives.
///
/// Clones share the underlying storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteSet {
    routes: Arc<Vec<Route>>,
}

impl RouteSet {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes: Arc::new(routes),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn primary(&self) -> Option<&Route> {
        self.routes.first()
    }

    pub fn primary_id(&self) -> Option<&RouteId> {
        self.primary().map(Route::id)
    }

    pub fn alternatives(&self) -> &[Route] {
        self.routes.get(1..).unwrap_or(&[])
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn get(&self, id: &RouteId) -> Option<&Route> {
        self.routes.iter().find(|route| route.id() == id)
    }

    pub fn ids(&self) -> Vec<RouteId> {
        self.routes.iter().map(|route| route.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Route> {
        self.routes.as_ref().clone()
    }
}

impl From<Vec<Route>> for RouteSet {
    fn from(routes: Vec<Route>) -> Self {
        Self::new(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(distances: &[f64]) -> RouteLeg {
        let geometry = (0..=distances.len())
            .map(|i| GeoPoint::new(i as f64, 0.0))
            .collect();
        RouteLeg::new(
            vec![LegStep {
                instruction: "Head east".into(),
                distance: 999.0,
                duration: 999.0,
            }],
            geometry,
            Some(LegAnnotation {
                distance: distances.to_vec(),
                duration: distances.iter().map(|d| d / 10.0).collect(),
                congestion: vec![Congestion::Low; distances.len()],
            }),
        )
    }

    #[test]
    fn route_distance_prefers_annotations() {
        let route = Route::new("r", vec![leg(&[10.0, 20.0]), leg(&[5.0])]);
        assert_eq!(route.distance(), 35.0);
        assert!((route.duration() - 3.5).abs() < 1e-9);
        assert_eq!(route.legs()[0].segment_count(), 2);
    }

    #[test]
    fn leg_without_annotation_uses_steps() {
        let leg = RouteLeg::new(
            vec![LegStep {
                instruction: "Arrive".into(),
                distance: 42.0,
                duration: 7.0,
            }],
            vec![],
            None,
        );
        assert_eq!(leg.distance(), 42.0);
        assert_eq!(leg.duration(), 7.0);
        assert_eq!(leg.segment_count(), 0);
    }

    #[test]
    fn route_set_splits_primary_and_alternatives() {
        let set = RouteSet::new(vec![
            Route::new("a", vec![]),
            Route::new("b", vec![]),
            Route::new("c", vec![]),
        ]);
        assert_eq!(set.primary_id(), Some(&RouteId::new("a")));
        assert_eq!(set.alternatives().len(), 2);
        assert!(set.get(&RouteId::new("c")).is_some());

        let empty = RouteSet::empty();
        assert!(empty.primary().is_none());
        assert!(empty.alternatives().is_empty());
    }
}
