//! Built-in processors. Office/DocuWorks conversion and the vector
//! embedding model are out of scope for this crate — those processors are
//! thin contract-honouring stand-ins that shell out to (or enqueue toward)
//! the externally specified converter rather than reimplementing it.

mod common;
mod docuworks;
mod image;
mod metadata_only;
mod office;
mod pdf;

pub use docuworks::DocuworksProcessor;
pub use image::ImageProcessor;
pub use metadata_only::MetadataOnlyProcessor;
pub use office::OfficeProcessor;
pub use pdf::PdfProcessor;
