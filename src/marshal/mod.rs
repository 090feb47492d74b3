// src/marshal/mod.rs

//! Line-oriented marshaling of the installation model over a pipe
//!
//! [`PipeWriter`] streams media, products and packages as tagged text
//! records and [`PipeReader`] rebuilds an equal model from the stream,
//! resolving references by package id. The [`zone`] module carries the
//! report a non-global zone sends back to its parent.

mod error;
mod model;
mod reader;
mod writer;
pub mod zone;

pub use error::{MarshalError, MarshalResult, Record};
pub use model::{
    Arch, Category, CdInfo, ContentsBrkdn, ContentsRecord, Depend, FSP_IGNORE, File, Filediff,
    FsSpace, Geo, HwConfig, Locale, Media, Modinfo, Module, ModuleType, OsInfo, PackageId, Patch,
    PatchNum, PkgHist, PkgInfo, PlatGroup, Platform, Product, SwConfig,
};
pub use reader::PipeReader;
pub use writer::PipeWriter;
pub use zone::{MergeSummary, PkgOverhead, ZoneMerge, credit_fs, merge_zone_report};
