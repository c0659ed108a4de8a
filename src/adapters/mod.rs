// Adapters layer: concrete readers and writers for the external formats
// (DAM CSV exports, stix calculation files, area reports).

pub mod dam_csv;
pub mod report;
pub mod stix;
