//! Generic feature collection for mapping tools (GeoJSON-shaped).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeatureGeometry {
    Point { coordinates: [f64; 3] },
    LineString { coordinates: Vec<[f64; 3]> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: FeatureGeometry,
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: FeatureGeometry) -> Self {
        Self {
            kind: "Feature".to_string(),
            geometry,
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_geojson_shape() {
        let collection = FeatureCollection::new(vec![Feature::new(FeatureGeometry::LineString {
            coordinates: vec![[0.0, 0.0, 1.0], [1.0, 0.0, 1.0]],
        })
        .with_property("class", "primary")]);
        let json = serde_json::to_value(&collection).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][0]["type"], "Feature");
        assert_eq!(json["features"][0]["geometry"]["type"], "LineString");
        assert_eq!(json["features"][0]["properties"]["class"], "primary");
    }
}
