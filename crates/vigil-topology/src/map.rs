//! JSON map description handed over by the map-building collaborator.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TopologyError};
use crate::{Point, WaypointGraph};

/// A vertex in a map file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapVertex {
    pub id: u32,
    pub x: i64,
    pub y: i64,
}

/// An undirected edge in a map file. Without a cost, the rounded Euclidean
/// distance is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEdge {
    pub a: u32,
    pub b: u32,
    #[serde(default)]
    pub cost: Option<u64>,
}

/// Serializable waypoint map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSpec {
    pub vertices: Vec<MapVertex>,
    #[serde(default)]
    pub edges: Vec<MapEdge>,
}

impl MapSpec {
    /// Parse a map from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| TopologyError::InvalidMap(e.to_string()))
    }

    /// Render the map as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| TopologyError::InvalidMap(e.to_string()))
    }
}

impl WaypointGraph {
    /// Build a graph from a map description.
    pub fn from_map(spec: &MapSpec) -> Result<Self> {
        let mut builder = Self::builder();
        for v in &spec.vertices {
            builder = builder.vertex(v.id, Point::new(v.x, v.y));
        }
        for e in &spec.edges {
            builder = match e.cost {
                Some(cost) => builder.weighted_edge(e.a, e.b, cost),
                None => builder.edge(e.a, e.b),
            };
        }
        builder.build()
    }

    /// Describe this graph as a map (explicit costs on every edge).
    pub fn to_map(&self) -> MapSpec {
        MapSpec {
            vertices: self
                .vertices()
                .map(|w| MapVertex {
                    id: w.id.value(),
                    x: w.position.x,
                    y: w.position.y,
                })
                .collect(),
            edges: self
                .edges()
                .into_iter()
                .map(|(a, b, cost)| MapEdge {
                    a: a.value(),
                    b: b.value(),
                    cost: Some(cost),
                })
                .collect(),
        }
    }
}
