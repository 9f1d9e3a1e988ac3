//! Emergency vehicle classes and bounding regions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Emergency vehicle class recognized by the vehicle detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Ambulance,
    PoliceCar,
    FireTruck,
    TrafficEnforcement,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Ambulance => "ambulance",
            VehicleType::PoliceCar => "police_car",
            VehicleType::FireTruck => "fire_truck",
            VehicleType::TrafficEnforcement => "traffic_enforcement",
        }
    }

    /// Map a detector class index to a vehicle type.
    ///
    /// Class ordering follows the trained model: 0 = ambulance,
    /// 1 = fire truck, 2 = police car, 3 = traffic enforcement.
    pub fn from_class_id(class_id: usize) -> Option<Self> {
        match class_id {
            0 => Some(VehicleType::Ambulance),
            1 => Some(VehicleType::FireTruck),
            2 => Some(VehicleType::PoliceCar),
            3 => Some(VehicleType::TrafficEnforcement),
            _ => None,
        }
    }
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bounding region of a vehicle detection, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Area in pixels.
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    /// Center point of the region.
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_type_roundtrip() {
        let json = serde_json::to_string(&VehicleType::PoliceCar).unwrap();
        assert_eq!(json, "\"police_car\"");
        let back: VehicleType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VehicleType::PoliceCar);
    }

    #[test]
    fn test_class_id_mapping() {
        assert_eq!(VehicleType::from_class_id(0), Some(VehicleType::Ambulance));
        assert_eq!(VehicleType::from_class_id(2), Some(VehicleType::PoliceCar));
        assert_eq!(VehicleType::from_class_id(42), None);
    }

    #[test]
    fn test_bounding_box_geometry() {
        let bbox = BoundingBox::new(10, 20, 100, 50);
        assert_eq!(bbox.area(), 5000);
        assert_eq!(bbox.center(), (60, 45));
    }
}
