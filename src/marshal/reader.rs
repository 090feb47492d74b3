// src/marshal/reader.rs

//! Pipe marshaler, read side
//!
//! A recursive descent over the grammar produced by
//! [`PipeWriter`](super::PipeWriter). Each composite is parsed into a fresh
//! value until its `END_` tag; any line the composite does not know aborts
//! the parse with the offending line. References written by id are collected
//! while a product is read and checked against that product once it is
//! complete.

use super::error::{MarshalError, MarshalResult, Record};
use super::model::{
    Arch, Category, CdInfo, ContentsBrkdn, ContentsRecord, Depend, File, Filediff, Geo,
    HwConfig, Locale, Media, Modinfo, Module, ModuleType, OsInfo, PackageId, Patch, PatchNum,
    PkgHist, PkgInfo, PlatGroup, Platform, Product, SwConfig,
};
use std::io::BufRead;
use std::str::FromStr;
use tracing::{debug, error};

/// One line of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Line<'a> {
    Field(&'a str, &'a str),
    Tag(&'a str),
}

impl<'a> Line<'a> {
    pub(crate) fn classify(line: &'a str) -> Self {
        match line.split_once('=') {
            Some((name, value)) => Line::Field(name, value),
            None => Line::Tag(line),
        }
    }
}

pub(crate) fn num<N: FromStr>(name: &str, value: &str) -> MarshalResult<N> {
    value.trim().parse().map_err(|_| MarshalError::SscanfFailed {
        line: format!("{name}={value}"),
    })
}

fn flag(name: &str, value: &str) -> MarshalResult<bool> {
    Ok(num::<u8>(name, value)? != 0)
}

fn text(value: &str) -> Option<String> {
    Some(value.to_string())
}

/// Apply one `contents_*` field; false if `name` is not one
pub(crate) fn brkdn_field(b: &mut ContentsBrkdn, name: &str, v: &str) -> MarshalResult<bool> {
    match name {
        "contents_packaged" => b.packaged = num(name, v)?,
        "contents_nonpkg" => b.nonpkg = num(name, v)?,
        "contents_products" => b.products = num(name, v)?,
        "contents_devfs" => b.devfs = num(name, v)?,
        "contents_savedfiles" => b.savedfiles = num(name, v)?,
        "contents_pkg_ovhd" => b.pkg_ovhd = num(name, v)?,
        "contents_patch_ovhd" => b.patch_ovhd = num(name, v)?,
        "contents_inodes_used" => b.inodes_used = num(name, v)?,
        _ => return Ok(false),
    }
    Ok(true)
}

pub struct PipeReader<R: BufRead> {
    input: R,
    peeked: Option<String>,
    line_no: usize,
    /// Ids referenced inside the product being read
    pending: Vec<PackageId>,
}

impl<R: BufRead> PipeReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            peeked: None,
            line_no: 0,
            pending: Vec::new(),
        }
    }

    fn fill(&mut self) -> MarshalResult<Option<String>> {
        let mut buf = String::new();
        if self.input.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        if buf.ends_with('\n') {
            buf.pop();
        }
        self.line_no += 1;
        debug!("pipe line {}: {}", self.line_no, buf);
        Ok(Some(buf))
    }

    /// Next line of the stream, `None` at end of stream
    pub(crate) fn next_line(&mut self) -> MarshalResult<Option<String>> {
        match self.peeked.take() {
            Some(line) => Ok(Some(line)),
            None => self.fill(),
        }
    }

    pub(crate) fn peek(&mut self) -> MarshalResult<Option<&str>> {
        if self.peeked.is_none() {
            self.peeked = self.fill()?;
        }
        Ok(self.peeked.as_deref())
    }

    fn expect_line(&mut self, record: Record) -> MarshalResult<String> {
        self.next_line()?
            .ok_or(MarshalError::UnexpectedEof { record })
    }

    fn expect_tag(&mut self, record: Record, tag: &str) -> MarshalResult<()> {
        let line = self.expect_line(record)?;
        if line == tag {
            Ok(())
        } else {
            Err(MarshalError::ReadFailed { record, line })
        }
    }

    /// Populate a fresh `T` line by line until `end`
    ///
    /// `apply` returns false for lines the record does not know.
    pub(crate) fn read_body<T: Default>(
        &mut self,
        record: Record,
        end: &str,
        mut apply: impl FnMut(&mut Self, &mut T, Line<'_>) -> MarshalResult<bool>,
    ) -> MarshalResult<T> {
        let mut value = T::default();
        loop {
            let line = self.expect_line(record)?;
            if line == end {
                return Ok(value);
            }
            if !apply(self, &mut value, Line::classify(&line))? {
                return Err(MarshalError::ReadFailed { record, line });
            }
        }
    }

    /// Read `item` records separated by `sep`
    ///
    /// Without `follow_link` only the first item is read and the separator,
    /// if any, is left for the caller.
    fn read_siblings<T>(
        &mut self,
        item: &str,
        sep: &str,
        record: Record,
        follow_link: bool,
        mut read_one: impl FnMut(&mut Self) -> MarshalResult<T>,
    ) -> MarshalResult<Vec<T>> {
        let mut items = Vec::new();
        loop {
            self.expect_tag(record, item)?;
            items.push(read_one(self)?);
            let more = follow_link && self.peek()? == Some(sep);
            if !more {
                return Ok(items);
            }
            self.next_line()?;
        }
    }

    fn read_container<T>(
        &mut self,
        container: &str,
        item: &str,
        sep: &str,
        record: Record,
        read_one: impl FnMut(&mut Self) -> MarshalResult<T>,
    ) -> MarshalResult<Vec<T>> {
        let items = self.read_siblings(item, sep, record, true, read_one)?;
        self.expect_tag(Record::List, &format!("END_{container}"))?;
        Ok(items)
    }

    fn read_string_list(&mut self, container: &str) -> MarshalResult<Vec<String>> {
        self.expect_tag(Record::StringList, "STRINGLIST")?;
        let mut list = Vec::new();
        loop {
            let line = self.expect_line(Record::StringList)?;
            if line == "END_STRINGLIST" {
                break;
            }
            match line.strip_prefix("string_ptr=") {
                Some(value) => list.push(value.to_string()),
                None => return Err(MarshalError::StringListAdd { line }),
            }
        }
        self.expect_tag(Record::List, &format!("END_{container}"))?;
        Ok(list)
    }

    fn read_charpp(&mut self, container: &str) -> MarshalResult<Vec<String>> {
        self.expect_tag(Record::CharPP, "CHARPP")?;
        let array = self.read_body(Record::CharPP, "END_CHARPP", |_, a: &mut Vec<String>, line| {
            match line {
                Line::Field("charp", v) => a.push(v.to_string()),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        self.expect_tag(Record::List, &format!("END_{container}"))?;
        Ok(array)
    }

    fn read_filepp(&mut self, container: &str) -> MarshalResult<Vec<File>> {
        self.expect_tag(Record::FilePP, "FILEPP_FILE")?;
        let files = self.read_body(Record::FilePP, "END_FILEPP", |r, files: &mut Vec<File>, line| {
            match line {
                Line::Tag("FILE") => files.push(r.file_body()?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        self.expect_tag(Record::List, &format!("END_{container}"))?;
        Ok(files)
    }

    fn read_id_list(
        &mut self,
        container: &str,
        item: &str,
        field: &str,
        record: Record,
    ) -> MarshalResult<Vec<PackageId>> {
        let end = format!("END_{item}");
        self.read_container(container, item, &format!("{item}_NEXT"), record, |r| {
            r.read_body(record, &end, |_, id: &mut PackageId, line| match line {
                Line::Field(name, v) if name == field => {
                    *id = PackageId::new(v);
                    Ok(true)
                }
                _ => Ok(false),
            })
        })
    }

    fn file_body(&mut self) -> MarshalResult<File> {
        self.read_body(Record::File, "END_FILE", |_, f: &mut File, line| {
            match line {
                Line::Field("f_path", v) => f.path = v.to_string(),
                Line::Field("f_name", v) => f.name = text(v),
                Line::Field(name @ "f_type", v) => f.kind = num(name, v)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    pub(crate) fn contents_brkdn_body(&mut self) -> MarshalResult<ContentsBrkdn> {
        self.read_body(Record::ContentsBrkdn, "END_CONTENTSBRKDN", |_, b: &mut ContentsBrkdn, line| {
            match line {
                Line::Field(name, v) => brkdn_field(b, name, v),
                Line::Tag(_) => Ok(false),
            }
        })
    }

    fn contents_record_body(&mut self) -> MarshalResult<ContentsRecord> {
        self.read_body(Record::ContentsRecord, "END_CONTENTSRECORD", |r, c: &mut ContentsRecord, line| {
            match line {
                Line::Field(name @ "cr_index", v) => c.index = num(name, v)?,
                Line::Tag("CONTENTSBRKDN") => c.brkdn = r.contents_brkdn_body()?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    pub(crate) fn read_contents_records(
        &mut self,
        container: &str,
    ) -> MarshalResult<Vec<ContentsRecord>> {
        self.read_container(
            container,
            "CONTENTSRECORD",
            "CONTENTSRECORD_NEXT",
            Record::ContentsRecord,
            Self::contents_record_body,
        )
    }

    /// Filediff fields; `replacing_pkg` is left for the caller to resolve
    pub(crate) fn filediff_body(&mut self) -> MarshalResult<Filediff> {
        self.read_body(Record::Filediff, "END_FILEDIFF", |_, d: &mut Filediff, line| {
            let Line::Field(name, v) = line else {
                return Ok(false);
            };
            match name {
                "owning_pkg" => d.owning_pkg = Some(PackageId::new(v)),
                "replacing_pkg" => d.replacing_pkg = Some(PackageId::new(v)),
                "diff_flags" => d.diff_flags = num(name, v)?,
                "linkptr" => d.linkptr = text(v),
                "link_found" => d.link_found = text(v),
                "major" => d.major = num(name, v)?,
                "minor" => d.minor = num(name, v)?,
                "exp_mode" => d.exp_mode = num(name, v)?,
                "act_mode" => d.act_mode = num(name, v)?,
                "exp_uid" => d.exp_uid = num(name, v)?,
                "act_uid" => d.act_uid = num(name, v)?,
                "exp_gid" => d.exp_gid = num(name, v)?,
                "act_gid" => d.act_gid = num(name, v)?,
                "exp_type" => d.exp_type = text(v),
                "actual_type" => d.actual_type = text(v),
                "pkg_class" => d.pkg_class = text(v),
                "component_path" => d.component_path = v.to_string(),
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn depend_body(&mut self) -> MarshalResult<Depend> {
        self.read_body(Record::Depend, "END_DEPEND", |_, d: &mut Depend, line| {
            match line {
                Line::Field("d_pkgid", v) => d.pkgid = v.to_string(),
                Line::Field("d_version", v) => d.version = text(v),
                Line::Field("d_arch", v) => d.arch = text(v),
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn read_depends(&mut self, container: &str) -> MarshalResult<Vec<Depend>> {
        self.read_container(container, "DEPEND", "DEPEND_D_NEXT", Record::Depend, Self::depend_body)
    }

    fn pkg_hist_body(&mut self) -> MarshalResult<PkgHist> {
        self.read_body(Record::PkgHist, "END_PKG_HIST", |r, h: &mut PkgHist, line| {
            match line {
                Line::Field("ph_pkgname", v) => h.pkgname = v.to_string(),
                Line::Field(name @ "ph_to_be_removed", v) => h.to_be_removed = flag(name, v)?,
                Line::Field(name @ "ph_needs_pkgrm", v) => h.needs_pkgrm = flag(name, v)?,
                Line::Field(name @ "ph_basedir_changed", v) => h.basedir_changed = flag(name, v)?,
                Line::Tag(tag @ "PH_REPLACED_BY") => h.replaced_by = r.read_string_list(tag)?,
                Line::Tag(tag @ "PH_DELETED_FILES") => h.deleted_files = r.read_string_list(tag)?,
                Line::Tag(tag @ "PH_CLUSTER_RM_LIST") => h.cluster_rm_list = r.read_string_list(tag)?,
                Line::Tag(tag @ "PH_IGNORE_LIST") => h.ignore_list = r.read_string_list(tag)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn patch_num_body(&mut self) -> MarshalResult<PatchNum> {
        self.read_body(Record::PatchNum, "END_PATCH_NUM", |_, p: &mut PatchNum, line| {
            match line {
                Line::Field("patch_num", v) => p.patch_num = v.to_string(),
                Line::Field("rev_num", v) => p.rev_num = v.to_string(),
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn pkg_info_body(&mut self) -> MarshalResult<PkgInfo> {
        self.read_body(Record::PkgInfo, "END_PKG_INFO", |_, p: &mut PkgInfo, line| {
            match line {
                Line::Field("pi_pkginst", v) => p.pkginst = v.to_string(),
                Line::Field("pi_name", v) => p.name = text(v),
                Line::Field("pi_arch", v) => p.arch = text(v),
                Line::Field("pi_version", v) => p.version = text(v),
                Line::Field("pi_basedir", v) => p.basedir = text(v),
                Line::Field("pi_catg", v) => p.catg = text(v),
                Line::Field(name @ "pi_status", v) => p.status = num(name, v)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn modinfo_node_body(&mut self) -> MarshalResult<Modinfo> {
        let node = self.read_body(
            Record::ModinfoNode,
            "END_MODINFO_NODE",
            |r, node: &mut Option<Modinfo>, line| {
                match line {
                    Line::Field("node_key", _) => {}
                    Line::Tag("MODINFO") if node.is_none() => *node = Some(r.modinfo_body()?),
                    _ => return Ok(false),
                }
                Ok(true)
            },
        )?;
        node.ok_or_else(|| MarshalError::ReadFailed {
            record: Record::ModinfoNode,
            line: "END_MODINFO_NODE".to_string(),
        })
    }

    fn read_modinfo_nodes(&mut self, container: &str) -> MarshalResult<Vec<Modinfo>> {
        self.read_container(
            container,
            "MODINFO_NODE",
            "MODINFO_NODE_NEXT",
            Record::ModinfoNode,
            Self::modinfo_node_body,
        )
    }

    fn modinfo_body(&mut self) -> MarshalResult<Modinfo> {
        let mut m = self.read_body(Record::Modinfo, "END_MODINFO", |r, m: &mut Modinfo, line| {
            match line {
                Line::Field(name, v) => match name {
                    "m_order" => m.order = num(name, v)?,
                    "m_status" => m.status = num(name, v)?,
                    "m_shared" => m.shared = num(name, v)?,
                    "m_action" => m.action = num(name, v)?,
                    "m_flags" => m.flags = num(name, v)?,
                    "m_refcnt" => m.refcnt = num(name, v)?,
                    "m_sunw_ptype" => m.sunw_ptype = num(name, v)?,
                    "m_pkgid" => m.pkgid = PackageId::new(v),
                    "m_pkginst" => m.pkginst = text(v),
                    "m_pkg_dir" => m.pkg_dir = text(v),
                    "m_name" => m.name = text(v),
                    "m_vendor" => m.vendor = text(v),
                    "m_version" => m.version = text(v),
                    "m_prodname" => m.prodname = text(v),
                    "m_prodvers" => m.prodvers = text(v),
                    "m_arch" => m.arch = text(v),
                    "m_expand_arch" => m.expand_arch = text(v),
                    "m_desc" => m.desc = text(v),
                    "m_category" => m.category = text(v),
                    "m_instdate" => m.instdate = text(v),
                    "m_patchid" => m.patchid = text(v),
                    "m_locale" => m.locale = text(v),
                    "m_l10n_pkglist" => m.l10n_pkglist = text(v),
                    "m_patchof" => {
                        let id = PackageId::new(v);
                        r.pending.push(id.clone());
                        m.patch_of = Some(id);
                    }
                    "m_basedir" => m.basedir = text(v),
                    "m_instdir" => m.instdir = text(v),
                    "m_spooled_size" => m.spooled_size = num(name, v)?,
                    "m_pkgovhd_size" => m.pkgovhd_size = num(name, v)?,
                    _ => return Ok(false),
                },
                Line::Tag(tag) => match tag {
                    // Localization links are rebuilt by the product
                    "M_L10N" => {
                        let ids = r.read_id_list(tag, "L10N", "l10n_package", Record::L10n)?;
                        r.pending.extend(ids);
                    }
                    "M_PKGS_LCLZD" => {
                        let ids =
                            r.read_id_list(tag, "PKGSLOCALIZED", "pkg_lclzd", Record::PkgsLocalized)?;
                        r.pending.extend(ids);
                    }
                    "M_INSTANCES" => m.instances = r.read_modinfo_nodes(tag)?,
                    "M_NEXT_PATCH" => m.next_patch = r.read_modinfo_nodes(tag)?,
                    "M_PDEPENDS" => m.pdepends = r.read_depends(tag)?,
                    "M_RDEPENDS" => m.rdepends = r.read_depends(tag)?,
                    "M_IDEPENDS" => m.idepends = r.read_depends(tag)?,
                    "M_REV_DEPENDS" => m.rev_depends = r.read_depends(tag)?,
                    "M_TEXT" => m.text = r.read_filepp(tag)?,
                    "M_DEMO" => m.demo = r.read_filepp(tag)?,
                    "M_INSTALL" => m.install = r.read_filepp(tag)?.into_iter().next(),
                    "M_ICON" => m.icon = r.read_filepp(tag)?.into_iter().next(),
                    "M_PKG_HIST" => {
                        m.pkg_hist = r.read_container(
                            tag,
                            "PKG_HIST",
                            "PKG_HIST_NEXT",
                            Record::PkgHist,
                            Self::pkg_hist_body,
                        )?
                    }
                    "M_DEFLT_FS" => {
                        m.deflt_fs = r.read_body(
                            Record::List,
                            "END_M_DEFLT_FS",
                            |_, sizes: &mut Vec<i64>, line| match line {
                                Line::Field(name @ "deflt_fs", v) => {
                                    sizes.push(num(name, v)?);
                                    Ok(true)
                                }
                                _ => Ok(false),
                            },
                        )?
                    }
                    "M_FILEDIFF" => {
                        let diffs = r.read_container(
                            tag,
                            "FILEDIFF",
                            "FILEDIFF_NEXT",
                            Record::Filediff,
                            Self::filediff_body,
                        )?;
                        r.pending
                            .extend(diffs.iter().filter_map(|d| d.replacing_pkg.clone()));
                        m.filediffs = diffs;
                    }
                    "M_NEWARCH_PATCHES" => {
                        m.newarch_patches = r.read_container(
                            tag,
                            "PATCH_NUM",
                            "PATCH_NUM_NEXT",
                            Record::PatchNum,
                            Self::patch_num_body,
                        )?
                    }
                    "M_LOC_STRLIST" => m.loc_strlist = r.read_string_list(tag)?,
                    "M_FS_USAGE" => m.fs_usage = r.read_contents_records(tag)?,
                    "PKG_INFO" => m.pkg_info = Some(r.pkg_info_body()?),
                    _ => return Ok(false),
                },
            }
            Ok(true)
        })?;

        let owner = m.pkgid.clone();
        for diff in &mut m.filediffs {
            diff.owning_pkg = Some(owner.clone());
        }
        Ok(m)
    }

    fn module_body(&mut self) -> MarshalResult<Module> {
        self.read_body(Record::Module, "END_MODULE", |r, m: &mut Module, line| {
            match line {
                Line::Field("type", v) => {
                    m.kind = ModuleType::parse(v).ok_or_else(|| MarshalError::ReadFailed {
                        record: Record::Module,
                        line: format!("type={v}"),
                    })?
                }
                Line::Field("m_pkgid", v) => m.pkgid = PackageId::new(v),
                Line::Field("m_name", v) => m.name = text(v),
                Line::Field("m_version", v) => m.version = text(v),
                Line::Tag(tag @ "MODULE_SUB") => {
                    m.sub = r.read_container(
                        tag,
                        "MODULE",
                        "MODULE_SUB_NEXT",
                        Record::Module,
                        Self::module_body,
                    )?
                }
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn module_node_body(&mut self) -> MarshalResult<Module> {
        let node = self.read_body(
            Record::ModuleNode,
            "END_MODULE_NODE",
            |r, node: &mut Option<Module>, line| {
                match line {
                    Line::Field("node_key", _) => {}
                    Line::Tag("MODULE") if node.is_none() => *node = Some(r.module_body()?),
                    _ => return Ok(false),
                }
                Ok(true)
            },
        )?;
        node.ok_or_else(|| MarshalError::ReadFailed {
            record: Record::ModuleNode,
            line: "END_MODULE_NODE".to_string(),
        })
    }

    fn patch_body(&mut self) -> MarshalResult<Patch> {
        self.read_body(Record::Patch, "END_PATCH", |r, p: &mut Patch, line| {
            match line {
                Line::Field("patchid", v) => p.patchid = v.to_string(),
                Line::Field(name @ "removed", v) => p.removed = flag(name, v)?,
                Line::Tag(tag @ "PATCH_PKGS") => {
                    p.patchpkgs = r.read_id_list(tag, "PATCHPKG", "patchpkg_mod", Record::PatchPkg)?;
                    r.pending.extend(p.patchpkgs.iter().cloned());
                }
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn arch_body(&mut self) -> MarshalResult<Arch> {
        self.read_body(Record::Arch, "END_ARCH", |r, a: &mut Arch, line| {
            match line {
                Line::Field("a_arch", v) => a.name = v.to_string(),
                Line::Field(name @ "a_selected", v) => a.selected = flag(name, v)?,
                Line::Field(name @ "a_loaded", v) => a.loaded = flag(name, v)?,
                Line::Tag(tag @ "A_PLATFORMS") => a.platforms = r.read_string_list(tag)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn sw_config_body(&mut self) -> MarshalResult<SwConfig> {
        self.read_body(Record::SwConfig, "END_SW_CONFIG", |r, s: &mut SwConfig, line| {
            match line {
                Line::Field("sw_name", v) => s.name = v.to_string(),
                Line::Tag(tag @ "SW_MEMBERS") => s.members = r.read_string_list(tag)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn hw_config_body(&mut self) -> MarshalResult<HwConfig> {
        self.read_body(Record::HwConfig, "END_HW_CONFIG", |r, h: &mut HwConfig, line| {
            match line {
                Line::Field("hw_node", v) => h.name = v.to_string(),
                Line::Tag(tag @ "HW_PKGS") => h.pkgs = r.read_string_list(tag)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn platform_body(&mut self) -> MarshalResult<Platform> {
        self.read_body(Record::Platform, "END_PLATFORM", |_, p: &mut Platform, line| {
            match line {
                Line::Field("plat_name", v) => p.name = v.to_string(),
                Line::Field("plat_model", v) => p.model = text(v),
                Line::Field("plat_isa", v) => p.isa = text(v),
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn platgroup_body(&mut self) -> MarshalResult<PlatGroup> {
        self.read_body(Record::PlatGroup, "END_PLATGROUP", |r, g: &mut PlatGroup, line| {
            match line {
                Line::Field("pltgrp_name", v) => g.name = v.to_string(),
                Line::Field("pltgrp_isa", v) => g.isa = text(v),
                Line::Field(name @ "pltgrp_export", v) => g.export = flag(name, v)?,
                Line::Tag(tag @ "PLTGRP_PLATFORMS") => {
                    g.platforms = r.read_container(
                        tag,
                        "PLATFORM",
                        "PLATFORM_NEXT",
                        Record::Platform,
                        Self::platform_body,
                    )?
                }
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn locale_body(&mut self) -> MarshalResult<Locale> {
        self.read_body(Record::Locale, "END_LOCALE", |_, l: &mut Locale, line| {
            match line {
                Line::Field("locale_name", v) => l.name = v.to_string(),
                Line::Field("locale_language", v) => l.language = text(v),
                Line::Field(name @ "locale_selected", v) => l.selected = flag(name, v)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn geo_body(&mut self) -> MarshalResult<Geo> {
        self.read_body(Record::Geo, "END_GEO", |r, g: &mut Geo, line| {
            match line {
                Line::Field("geo_name", v) => g.name = v.to_string(),
                Line::Field("geo_desc", v) => g.description = text(v),
                Line::Field(name @ "geo_selected", v) => g.selected = flag(name, v)?,
                Line::Tag(tag @ "GEO_LOCALES") => g.locales = r.read_string_list(tag)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn category_body(&mut self) -> MarshalResult<Category> {
        self.read_body(Record::Category, "END_CATEGORY", |_, c: &mut Category, line| {
            match line {
                Line::Field("cat_name", v) => c.name = v.to_string(),
                Line::Field("cat_info", v) => c.info = text(v),
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn read_categories(&mut self, container: &str) -> MarshalResult<Vec<Category>> {
        self.read_container(container, "CATEGORY", "CATEGORY_NEXT", Record::Category, Self::category_body)
    }

    fn cd_info_body(&mut self) -> MarshalResult<CdInfo> {
        self.read_body(Record::CdInfo, "END_CD_INFO", |_, c: &mut CdInfo, line| {
            match line {
                Line::Field("cd_label", v) => c.label = v.to_string(),
                Line::Field("cd_release", v) => c.release = text(v),
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn os_info_body(&mut self) -> MarshalResult<OsInfo> {
        self.read_body(Record::OsInfo, "END_OS_INFO", |_, o: &mut OsInfo, line| {
            match line {
                Line::Field("os_name", v) => o.name = v.to_string(),
                Line::Field("os_version", v) => o.version = text(v),
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn product_fields(&mut self) -> MarshalResult<Product> {
        self.read_body(Record::Product, "END_PRODUCT", |r, p: &mut Product, line| {
            match line {
                Line::Field(name, v) => match name {
                    "p_name" => p.name = text(v),
                    "p_version" => p.version = text(v),
                    "p_rev" => p.rev = text(v),
                    "p_status" => p.status = num(name, v)?,
                    "p_id" => p.id = text(v),
                    "p_pkgdir" => p.pkgdir = text(v),
                    "p_instdir" => p.instdir = text(v),
                    "p_zonename" => p.zone_name = text(v),
                    "p_rootdir" => p.rootdir = text(v),
                    _ => return Ok(false),
                },
                Line::Tag(tag) => match tag {
                    "P_ARCHES" => {
                        p.arches =
                            r.read_container(tag, "ARCH", "ARCH_NEXT", Record::Arch, Self::arch_body)?
                    }
                    "P_SWCFG" => {
                        p.sw_config = r.read_container(
                            tag,
                            "SW_CONFIG",
                            "SW_CONFIG_NEXT",
                            Record::SwConfig,
                            Self::sw_config_body,
                        )?
                    }
                    "P_PLATGRP" => {
                        p.platgroups = r.read_container(
                            tag,
                            "PLATGROUP",
                            "PLATGROUP_NEXT",
                            Record::PlatGroup,
                            Self::platgroup_body,
                        )?
                    }
                    "HW_CONFIG" => p.hw_config = Some(r.hw_config_body()?),
                    "P_PACKAGES" => {
                        for m in r.read_modinfo_nodes(tag)? {
                            if p.package(&m.pkgid).is_some() {
                                return Err(MarshalError::AddNode { id: m.pkgid.0 });
                            }
                            p.packages.push(m);
                        }
                    }
                    "P_CLUSTERS" => {
                        p.clusters = r.read_container(
                            tag,
                            "MODULE_NODE",
                            "MODULE_NODE_NEXT",
                            Record::ModuleNode,
                            Self::module_node_body,
                        )?
                    }
                    "P_LOCALES" => {
                        p.locales = r.read_container(
                            tag,
                            "LOCALE",
                            "LOCALE_NEXT",
                            Record::Locale,
                            Self::locale_body,
                        )?
                    }
                    "P_GEOS" => {
                        p.geos = r.read_container(tag, "GEO", "GEO_NEXT", Record::Geo, Self::geo_body)?
                    }
                    "CD_INFO" => p.cd_info = Some(r.cd_info_body()?),
                    "P_OSINFO" => {
                        p.os_info = r.read_container(
                            tag,
                            "OS_INFO",
                            "OS_INFO_NEXT",
                            Record::OsInfo,
                            Self::os_info_body,
                        )?
                    }
                    "P_ORPHAN_PATCH" => p.orphan_patches = r.read_modinfo_nodes(tag)?,
                    "P_CATEGORIES" => p.categories = r.read_categories(tag)?,
                    "P_PATCHES" => {
                        p.patches = r.read_container(
                            tag,
                            "PATCH",
                            "PATCH_NEXT",
                            Record::Patch,
                            Self::patch_body,
                        )?
                    }
                    "P_MODFILE" => p.modfile = r.read_string_list(tag)?,
                    "P_INHERITEDDIRS" => p.inherited_dirs = r.read_charpp(tag)?,
                    _ => return Ok(false),
                },
            }
            Ok(true)
        })
    }

    /// Parse a product and check every id it references
    fn product_body(&mut self) -> MarshalResult<Product> {
        let outer = std::mem::take(&mut self.pending);
        let parsed = self.product_fields();
        let refs = std::mem::replace(&mut self.pending, outer);
        let mut product = parsed?;

        for id in refs {
            if product.resolve(&id).is_none() {
                return Err(MarshalError::FindNode { id: id.0 });
            }
        }
        product.localize_packages();
        Ok(product)
    }

    fn media_body(&mut self) -> MarshalResult<Media> {
        self.read_body(Record::Media, "END_MEDIA", |r, media: &mut Media, line| {
            match line {
                Line::Field(name, v) => match name {
                    "med_type" => media.media_type = num(name, v)?,
                    "med_status" => media.status = num(name, v)?,
                    "med_machine" => media.machine = num(name, v)?,
                    "med_device" => media.device = text(v),
                    "med_dir" => media.dir = text(v),
                    "med_volume" => media.volume = text(v),
                    "med_flags" => media.flags = num(name, v)?,
                    "med_zonename" => media.zone_name = text(v),
                    _ => return Ok(false),
                },
                Line::Tag("MED_HOSTNAMES") => media.hostnames = r.read_string_list("MED_HOSTNAMES")?,
                Line::Tag("MED_CATEGORIES") => media.categories = r.read_categories("MED_CATEGORIES")?,
                Line::Tag("MED_PRODUCTS") => {
                    media.products = r.read_container(
                        "MED_PRODUCTS",
                        "PRODUCT",
                        "PRODUCT_NEXT",
                        Record::Product,
                        Self::product_body,
                    )?
                }
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn logged<T>(result: MarshalResult<T>) -> MarshalResult<T> {
        result.inspect_err(|e| error!("Pipe read failed: {}", e))
    }

    pub fn read_media(&mut self) -> MarshalResult<Media> {
        let result = self
            .expect_tag(Record::Media, "MEDIA")
            .and_then(|_| self.media_body());
        Self::logged(result)
    }

    pub fn read_product(&mut self) -> MarshalResult<Product> {
        let result = self
            .expect_tag(Record::Product, "PRODUCT")
            .and_then(|_| self.product_body());
        Self::logged(result)
    }

    /// Products separated by `PRODUCT_NEXT`; see [`Self::read_modules`]
    pub fn read_products(&mut self, follow_link: bool) -> MarshalResult<Vec<Product>> {
        let result = self.read_siblings(
            "PRODUCT",
            "PRODUCT_NEXT",
            Record::Product,
            follow_link,
            Self::product_body,
        );
        Self::logged(result)
    }

    /// Read a standalone package; references it makes are not checked
    pub fn read_modinfo(&mut self) -> MarshalResult<Modinfo> {
        let outer = std::mem::take(&mut self.pending);
        let result = self
            .expect_tag(Record::Modinfo, "MODINFO")
            .and_then(|_| self.modinfo_body());
        self.pending = outer;
        Self::logged(result)
    }

    /// Read sibling modules separated by `MODULE_SUB_NEXT`
    ///
    /// With `follow_link` false only the first module is returned and the
    /// stream is left at the separator, so the caller can link siblings
    /// itself.
    pub fn read_modules(&mut self, follow_link: bool) -> MarshalResult<Vec<Module>> {
        let result = self.read_siblings(
            "MODULE",
            "MODULE_SUB_NEXT",
            Record::Module,
            follow_link,
            Self::module_body,
        );
        Self::logged(result)
    }

    pub fn read_filediff(&mut self) -> MarshalResult<Filediff> {
        let result = self
            .expect_tag(Record::Filediff, "FILEDIFF")
            .and_then(|_| self.filediff_body());
        Self::logged(result)
    }

    /// Every media record up to the end of the stream
    pub fn read_all_media(&mut self) -> MarshalResult<Vec<Media>> {
        let mut all = Vec::new();
        while let Some(line) = self.next_line()? {
            match line.as_str() {
                "" => continue,
                "MEDIA" => all.push(Self::logged(self.media_body())?),
                _ => {
                    error!("Pipe read failed: invalid line {:?}", line);
                    return Err(MarshalError::InvalidLine { line });
                }
            }
        }
        Ok(all)
    }
}
