#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Down,
    Move,
    Up,
}

impl EventKind {
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Down => 0,
            Self::Move => 1,
            Self::Up => 2,
        }
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Down),
            1 => Some(Self::Move),
            2 => Some(Self::Up),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Down => "down",
            Self::Move => "move",
            Self::Up => "up",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "down" => Some(Self::Down),
            "move" => Some(Self::Move),
            "up" => Some(Self::Up),
            _ => None,
        }
    }
}

/// One pointer sample as delivered by the host.
///
/// `x`, `y` and both contact axes are normalized by the surface size; `raw_x`
/// and `raw_y` keep the original pixel position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TouchSample {
    pub x: f64,
    pub y: f64,
    pub orientation: f64,
    pub minor_axis: f64,
    pub major_axis: f64,
    pub pressure: f64,
    pub raw_x: f64,
    pub raw_y: f64,
    pub kind: EventKind,
    pub pointer_id: u8,
    pub timestamp_ms: u64,
}

impl TouchSample {
    pub fn new(kind: EventKind, pointer_id: u8, x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self {
            x,
            y,
            orientation: 0.0,
            minor_axis: 0.0,
            major_axis: 0.0,
            pressure: 0.0,
            raw_x: 0.0,
            raw_y: 0.0,
            kind,
            pointer_id,
            timestamp_ms,
        }
    }

    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = pressure;
        self
    }

    pub fn with_contact(mut self, minor_axis: f64, major_axis: f64, orientation: f64) -> Self {
        self.minor_axis = minor_axis;
        self.major_axis = major_axis;
        self.orientation = orientation;
        self
    }

    pub fn with_raw(mut self, raw_x: f64, raw_y: f64) -> Self {
        self.raw_x = raw_x;
        self.raw_y = raw_y;
        self
    }

    pub fn position(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    pub fn distance_to(&self, other: &TouchSample) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Simultaneous touches reported as one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiTouchFrame {
    pub timestamp_ms: u64,
    pub touches: Vec<TouchSample>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modality {
    Touch,
    MultiTouch,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Observation {
    Touch(TouchSample),
    MultiTouch(MultiTouchFrame),
}

impl Observation {
    pub fn modality(&self) -> Modality {
        match self {
            Self::Touch(_) => Modality::Touch,
            Self::MultiTouch(_) => Modality::MultiTouch,
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Self::Touch(sample) => sample.timestamp_ms,
            Self::MultiTouch(frame) => frame.timestamp_ms,
        }
    }
}

impl From<TouchSample> for Observation {
    fn from(sample: TouchSample) -> Self {
        Self::Touch(sample)
    }
}
