// src/marshal/error.rs

//! Marshaler error codes

use std::fmt;
use thiserror::Error;

/// Composite records of the pipe grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Media,
    Product,
    Modinfo,
    ModinfoNode,
    Module,
    ModuleNode,
    Patch,
    PatchPkg,
    Filediff,
    ContentsRecord,
    ContentsBrkdn,
    FsSpace,
    Arch,
    StringList,
    CharPP,
    FilePP,
    File,
    Depend,
    L10n,
    PkgsLocalized,
    PkgHist,
    PatchNum,
    SwConfig,
    HwConfig,
    PlatGroup,
    Platform,
    Geo,
    Locale,
    Category,
    PkgInfo,
    CdInfo,
    OsInfo,
    NewMediaPkgOvhd,
    ProdPkgOvhd,
    List,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Record::Media => "media",
            Record::Product => "product",
            Record::Modinfo => "modinfo",
            Record::ModinfoNode => "modinfo node",
            Record::Module => "module",
            Record::ModuleNode => "module node",
            Record::Patch => "patch",
            Record::PatchPkg => "patchpkg",
            Record::Filediff => "filediff",
            Record::ContentsRecord => "contents record",
            Record::ContentsBrkdn => "contents breakdown",
            Record::FsSpace => "fsspace",
            Record::Arch => "arch",
            Record::StringList => "string list",
            Record::CharPP => "string array",
            Record::FilePP => "file array",
            Record::File => "file",
            Record::Depend => "depend",
            Record::L10n => "l10n",
            Record::PkgsLocalized => "pkgs localized",
            Record::PkgHist => "pkg_hist",
            Record::PatchNum => "patch_num",
            Record::SwConfig => "sw_config",
            Record::HwConfig => "hw_config",
            Record::PlatGroup => "platgroup",
            Record::Platform => "platform",
            Record::Geo => "geo",
            Record::Locale => "locale",
            Record::Category => "category",
            Record::PkgInfo => "pkg_info",
            Record::CdInfo => "cd_info",
            Record::OsInfo => "os_info",
            Record::NewMediaPkgOvhd => "new media package overhead",
            Record::ProdPkgOvhd => "product package overhead",
            Record::List => "list",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum MarshalError {
    #[error("failed reading {record}: unexpected line {line:?}")]
    ReadFailed { record: Record, line: String },

    #[error("malformed number in {line:?}")]
    SscanfFailed { line: String },

    #[error("package {id} not found in product")]
    FindNode { id: String },

    #[error("package {id} listed twice in product")]
    AddNode { id: String },

    #[error("bad string list entry {line:?}")]
    StringListAdd { line: String },

    #[error("invalid line {line:?}")]
    InvalidLine { line: String },

    #[error("end of stream inside {record}")]
    UnexpectedEof { record: Record },

    #[error("value of {field} contains a newline")]
    EmbeddedNewline { field: String },

    #[error("pipe I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for marshaler operations
pub type MarshalResult<T> = std::result::Result<T, MarshalError>;
