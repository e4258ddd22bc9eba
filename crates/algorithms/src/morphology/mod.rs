//! Binary morphology for change masks
//!
//! - **Labelling**: connected components of true or false pixels
//! - **Small-object removal**: clears true regions below a pixel count
//! - **Small-hole filling**: sets enclosed false regions below a pixel count

mod clean;
mod connectivity;
mod label;

pub use clean::{clean_mask, fill_small_holes, remove_small_objects, CleanMask, CleanParams, CleanSummary};
pub use connectivity::Connectivity;
pub use label::{label_components, Components, Region};
