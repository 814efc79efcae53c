use serde::{Deserialize, Serialize};

pub type PieceId = String;

/// Default cut margin in millimetres.
pub const DEFAULT_CUT_MARGIN: u32 = 80;
/// Default waste valorization rate, in currency per unit of waste.
pub const DEFAULT_VALORIZATION_RATE: f64 = 80.0;
/// Default minimum waste rate (percent) below which waste is not credited.
pub const DEFAULT_MIN_WASTE_RATE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Section {
    pub width: u32,
    pub height: u32,
}

impl Section {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Raw dimensions in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dims {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dims {
    pub fn new(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    pub fn of(section: Section, length: f64) -> Self {
        Self::new(length, section.width as f64, section.height as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub material: String,
    pub section: Section,
    pub length: f64,
}

impl Piece {
    pub fn new(id: impl Into<PieceId>, material: impl Into<String>, section: Section, length: f64) -> Self {
        Self {
            id: id.into(),
            material: material.into(),
            section,
            length,
        }
    }

    pub fn dims(&self) -> Dims {
        Dims::of(self.section, self.length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[serde(alias = "ml")]
    Length,
    #[serde(alias = "m2")]
    Area,
    #[serde(alias = "m3")]
    Volume,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Length => "ml",
            Unit::Area => "m2",
            Unit::Volume => "m3",
        }
    }

    /// Waste can only be resold for surface and volume materials.
    pub fn supports_valorization(&self) -> bool {
        !matches!(self, Unit::Length)
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a quantity is measured for materials that are not optimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureMethod {
    #[default]
    Manual,
    ListLength,
    PhysicalLength,
    FrontFaceArea,
    ReferenceFaceArea,
    RealArea,
    StandardVolume,
    ListVolume,
    PhysicalVolume,
}

impl MeasureMethod {
    /// The unit an alternate method reports in, `None` for the manual formula.
    pub fn unit(&self) -> Option<Unit> {
        match self {
            MeasureMethod::Manual => None,
            MeasureMethod::ListLength | MeasureMethod::PhysicalLength => Some(Unit::Length),
            MeasureMethod::FrontFaceArea
            | MeasureMethod::ReferenceFaceArea
            | MeasureMethod::RealArea => Some(Unit::Area),
            MeasureMethod::StandardVolume
            | MeasureMethod::ListVolume
            | MeasureMethod::PhysicalVolume => Some(Unit::Volume),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureMethod::Manual => "manual",
            MeasureMethod::ListLength => "list_length",
            MeasureMethod::PhysicalLength => "physical_length",
            MeasureMethod::FrontFaceArea => "front_face_area",
            MeasureMethod::ReferenceFaceArea => "reference_face_area",
            MeasureMethod::RealArea => "real_area",
            MeasureMethod::StandardVolume => "standard_volume",
            MeasureMethod::ListVolume => "list_volume",
            MeasureMethod::PhysicalVolume => "physical_volume",
        }
    }
}

impl std::str::FromStr for MeasureMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s {
            "manual" => MeasureMethod::Manual,
            "list_length" => MeasureMethod::ListLength,
            "physical_length" => MeasureMethod::PhysicalLength,
            "front_face_area" => MeasureMethod::FrontFaceArea,
            "reference_face_area" => MeasureMethod::ReferenceFaceArea,
            "real_area" => MeasureMethod::RealArea,
            "standard_volume" => MeasureMethod::StandardVolume,
            "list_volume" => MeasureMethod::ListVolume,
            "physical_volume" => MeasureMethod::PhysicalVolume,
            _ => return Err(format!("unknown measurement method '{}'", s)),
        };
        Ok(method)
    }
}

/// Measurement method chosen for each unit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Methods {
    #[serde(default)]
    pub length: MeasureMethod,
    #[serde(default)]
    pub area: MeasureMethod,
    #[serde(default)]
    pub volume: MeasureMethod,
}

impl Methods {
    pub fn for_unit(&self, unit: Unit) -> MeasureMethod {
        match unit {
            Unit::Length => self.length,
            Unit::Area => self.area,
            Unit::Volume => self.volume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Keep the order the lengths were given in.
    #[default]
    Auto,
    SmallFirst,
    LargeFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StockMode {
    Fixed {
        lengths: Vec<u32>,
        #[serde(default)]
        priority: Priority,
    },
    Range {
        min: u32,
        max: u32,
        step: u32,
    },
}

impl Default for StockMode {
    fn default() -> Self {
        StockMode::Range {
            min: 2500,
            max: 13000,
            step: 500,
        }
    }
}

/// Per-material optimization settings, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialConfig {
    pub unit: Unit,
    pub optimize: bool,
    #[serde(default)]
    pub stock: StockMode,
    #[serde(default = "default_cut_margin")]
    pub cut_margin: u32,
    #[serde(default)]
    pub methods: Methods,
    #[serde(default = "default_valorization_rate")]
    pub valorization_rate: f64,
    /// Percent.
    #[serde(default = "default_min_waste_rate")]
    pub min_waste_rate: f64,
    #[serde(default)]
    pub waste_credit: bool,
}

fn default_cut_margin() -> u32 {
    DEFAULT_CUT_MARGIN
}

fn default_valorization_rate() -> f64 {
    DEFAULT_VALORIZATION_RATE
}

fn default_min_waste_rate() -> f64 {
    DEFAULT_MIN_WASTE_RATE
}

impl MaterialConfig {
    pub fn new(unit: Unit) -> Self {
        Self {
            unit,
            optimize: true,
            stock: StockMode::default(),
            cut_margin: DEFAULT_CUT_MARGIN,
            methods: Methods::default(),
            valorization_rate: DEFAULT_VALORIZATION_RATE,
            min_waste_rate: DEFAULT_MIN_WASTE_RATE,
            waste_credit: false,
        }
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_stock(mut self, stock: StockMode) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_cut_margin(mut self, margin: u32) -> Self {
        self.cut_margin = margin;
        self
    }

    /// Sets the method for the unit it reports in. `Manual` has no unit of
    /// its own and resets the material's current unit only.
    pub fn with_method(mut self, method: MeasureMethod) -> Self {
        match method.unit().unwrap_or(self.unit) {
            Unit::Length => self.methods.length = method,
            Unit::Area => self.methods.area = method,
            Unit::Volume => self.methods.volume = method,
        }
        self
    }

    pub fn with_waste_credit(mut self, rate: f64, min_waste_rate: f64) -> Self {
        self.waste_credit = true;
        self.valorization_rate = rate;
        self.min_waste_rate = min_waste_rate;
        self
    }

    /// Measurement method for this material's own unit.
    pub fn method(&self) -> MeasureMethod {
        self.methods.for_unit(self.unit)
    }
}

/// One stock bar with the pieces cut from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub id: u32,
    pub material: String,
    pub section: Section,
    pub pieces: Vec<PieceId>,
    pub piece_lengths: Vec<f64>,
    pub chosen_length: u32,
    pub occupied: f64,
    pub waste: f64,
    pub quantity: f64,
    pub used_quantity: f64,
    pub piece_quantities: Vec<f64>,
    pub waste_rate: f64,
    pub price: f64,
    pub over_length: bool,
}

impl Bar {
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn waste_percent(&self) -> f64 {
        self.waste_rate * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandKind {
    Stock { section: Section, length: u32 },
    NotOptimized,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::Stock { section, length } => write!(f, "{} @ {}mm", section, length),
            CommandKind::NotOptimized => f.write_str("NOT OPTIMIZED"),
        }
    }
}

/// One purchase line. `count` is a bar count, or a piece count for
/// materials that are not optimized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandLine {
    pub material: String,
    pub kind: CommandKind,
    pub count: usize,
    /// Percent.
    pub avg_waste_rate: f64,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialSummary {
    pub material: String,
    pub unit: Unit,
    pub optimized: bool,
    pub purchased: f64,
    pub used: f64,
    pub unit_price: f64,
    pub total_price: f64,
    pub waste_valorization: f64,
}

impl MaterialSummary {
    pub fn waste_quantity(&self) -> f64 {
        (self.purchased - self.used).max(0.0)
    }

    /// Fraction of the purchased quantity that ends up as waste.
    pub fn waste_rate(&self) -> f64 {
        if !self.optimized || self.purchased <= 0.0 {
            return 0.0;
        }
        1.0 - self.used / self.purchased
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarRef {
    Bar(u32),
    NotOptimized,
}

impl Serialize for BarRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BarRef::Bar(id) => serializer.serialize_u32(*id),
            BarRef::NotOptimized => serializer.serialize_str("NOT_OPTIMIZED"),
        }
    }
}

impl std::fmt::Display for BarRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BarRef::Bar(id) => write!(f, "{}", id),
            BarRef::NotOptimized => f.write_str("NOT_OPTIMIZED"),
        }
    }
}

/// Per-piece result written back to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieceAttributes {
    pub bar: BarRef,
    pub waste_rate: String,
}

impl PieceAttributes {
    pub fn new(bar: BarRef, waste_rate: f64) -> Self {
        Self {
            bar,
            waste_rate: format!("{:.2} %", waste_rate * 100.0),
        }
    }

    pub fn not_optimized() -> Self {
        Self::new(BarRef::NotOptimized, 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieceResult {
    pub piece_id: PieceId,
    #[serde(flatten)]
    pub attributes: PieceAttributes,
    /// Quantity the piece itself uses, in the material's unit.
    pub quantity: f64,
    /// Share of the purchased quantity attributed to the piece.
    pub purchased: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// The bar's content exceeds every stock length; the largest was used.
    OverLengthPiece {
        bar_id: u32,
        material: String,
        section: Section,
        occupied: f64,
        chosen_length: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub material: String,
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.material, self.message)
    }
}
