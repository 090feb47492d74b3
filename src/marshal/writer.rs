// src/marshal/writer.rs

//! Pipe marshaler, write side
//!
//! Every composite is written as its tag, one `name=value` line per field
//! and the matching `END_` tag, after which the stream is flushed. Lists
//! live in a named container and their items are separated by a `_NEXT`
//! token. References to packages are written as their `m_pkgid`. File
//! arrays open with `FILEPP_FILE` and close with `END_FILEPP`.

use super::error::{MarshalError, MarshalResult};
use super::model::{
    Arch, Category, CdInfo, ContentsBrkdn, ContentsRecord, Depend, File, Filediff, FsSpace,
    Geo, HwConfig, Locale, Media, Modinfo, Module, OsInfo, PackageId, Patch, PatchNum,
    PkgHist, PkgInfo, PlatGroup, Platform, Product, SwConfig,
};
use std::fmt::Display;
use std::io::Write;

fn flag(value: bool) -> u8 {
    u8::from(value)
}

pub struct PipeWriter<W: Write> {
    out: W,
}

impl<W: Write> PipeWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub(crate) fn tag(&mut self, tag: &str) -> MarshalResult<()> {
        writeln!(self.out, "{tag}")?;
        Ok(())
    }

    /// Close a composite and flush it to the reader
    pub(crate) fn end(&mut self, tag: &str) -> MarshalResult<()> {
        self.close(&format!("END_{tag}"))
    }

    pub(crate) fn close(&mut self, token: &str) -> MarshalResult<()> {
        writeln!(self.out, "{token}")?;
        self.out.flush()?;
        Ok(())
    }

    /// Write a string field; embedded newlines cannot be represented
    pub(crate) fn field(&mut self, name: &str, value: &str) -> MarshalResult<()> {
        if value.contains('\n') {
            return Err(MarshalError::EmbeddedNewline {
                field: name.to_string(),
            });
        }
        writeln!(self.out, "{name}={value}")?;
        Ok(())
    }

    pub(crate) fn num(&mut self, name: &str, value: impl Display) -> MarshalResult<()> {
        writeln!(self.out, "{name}={value}")?;
        Ok(())
    }

    fn opt(&mut self, name: &str, value: &Option<String>) -> MarshalResult<()> {
        match value {
            Some(v) => self.field(name, v),
            None => Ok(()),
        }
    }

    fn list<T>(
        &mut self,
        container: &str,
        sep: &str,
        items: &[T],
        mut write_one: impl FnMut(&mut Self, &T) -> MarshalResult<()>,
    ) -> MarshalResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.tag(container)?;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.tag(sep)?;
            }
            write_one(self, item)?;
        }
        self.end(container)
    }

    pub fn write_string_list(&mut self, container: &str, list: &[String]) -> MarshalResult<()> {
        if list.is_empty() {
            return Ok(());
        }
        self.tag(container)?;
        self.tag("STRINGLIST")?;
        for s in list {
            self.field("string_ptr", s)?;
        }
        self.end("STRINGLIST")?;
        self.end(container)
    }

    fn write_charpp(&mut self, container: &str, array: &[String]) -> MarshalResult<()> {
        if array.is_empty() {
            return Ok(());
        }
        self.tag(container)?;
        self.tag("CHARPP")?;
        for s in array {
            self.field("charp", s)?;
        }
        self.end("CHARPP")?;
        self.end(container)
    }

    fn write_filepp(&mut self, container: &str, files: &[File]) -> MarshalResult<()> {
        if files.is_empty() {
            return Ok(());
        }
        self.tag(container)?;
        self.tag("FILEPP_FILE")?;
        for f in files {
            self.write_file(f)?;
        }
        self.end("FILEPP")?;
        self.end(container)
    }

    fn write_file(&mut self, f: &File) -> MarshalResult<()> {
        self.tag("FILE")?;
        self.field("f_path", &f.path)?;
        self.opt("f_name", &f.name)?;
        self.num("f_type", f.kind)?;
        self.end("FILE")
    }

    fn write_id_list(
        &mut self,
        container: &str,
        item: &str,
        field: &str,
        ids: &[PackageId],
    ) -> MarshalResult<()> {
        let sep = format!("{item}_NEXT");
        self.list(container, &sep, ids, |w, id| {
            w.tag(item)?;
            w.field(field, id.as_str())?;
            w.end(item)
        })
    }

    pub fn write_contents_brkdn(&mut self, b: &ContentsBrkdn) -> MarshalResult<()> {
        self.tag("CONTENTSBRKDN")?;
        self.num("contents_packaged", b.packaged)?;
        self.num("contents_nonpkg", b.nonpkg)?;
        self.num("contents_products", b.products)?;
        self.num("contents_devfs", b.devfs)?;
        self.num("contents_savedfiles", b.savedfiles)?;
        self.num("contents_pkg_ovhd", b.pkg_ovhd)?;
        self.num("contents_patch_ovhd", b.patch_ovhd)?;
        self.num("contents_inodes_used", b.inodes_used)?;
        self.end("CONTENTSBRKDN")
    }

    fn write_contents_record(&mut self, r: &ContentsRecord) -> MarshalResult<()> {
        self.tag("CONTENTSRECORD")?;
        self.num("cr_index", r.index)?;
        self.write_contents_brkdn(&r.brkdn)?;
        self.end("CONTENTSRECORD")
    }

    pub(crate) fn write_contents_records(
        &mut self,
        container: &str,
        records: &[ContentsRecord],
    ) -> MarshalResult<()> {
        self.list(container, "CONTENTSRECORD_NEXT", records, Self::write_contents_record)
    }

    /// Fields of a filediff; `owning_pkg` is never part of the body
    pub(crate) fn write_filediff_body(&mut self, d: &Filediff) -> MarshalResult<()> {
        if let Some(pkg) = &d.replacing_pkg {
            self.field("replacing_pkg", pkg.as_str())?;
        }
        self.num("diff_flags", d.diff_flags)?;
        self.opt("linkptr", &d.linkptr)?;
        self.opt("link_found", &d.link_found)?;
        self.num("major", d.major)?;
        self.num("minor", d.minor)?;
        self.num("exp_mode", d.exp_mode)?;
        self.num("act_mode", d.act_mode)?;
        self.num("exp_uid", d.exp_uid)?;
        self.num("act_uid", d.act_uid)?;
        self.num("exp_gid", d.exp_gid)?;
        self.num("act_gid", d.act_gid)?;
        self.opt("exp_type", &d.exp_type)?;
        self.opt("actual_type", &d.actual_type)?;
        self.opt("pkg_class", &d.pkg_class)?;
        // Written in full however long it is
        self.field("component_path", &d.component_path)
    }

    pub fn write_filediff(&mut self, d: &Filediff) -> MarshalResult<()> {
        self.tag("FILEDIFF")?;
        self.write_filediff_body(d)?;
        self.end("FILEDIFF")
    }

    fn write_depend(&mut self, d: &Depend) -> MarshalResult<()> {
        self.tag("DEPEND")?;
        self.field("d_pkgid", &d.pkgid)?;
        self.opt("d_version", &d.version)?;
        self.opt("d_arch", &d.arch)?;
        self.end("DEPEND")
    }

    fn write_depends(&mut self, container: &str, depends: &[Depend]) -> MarshalResult<()> {
        self.list(container, "DEPEND_D_NEXT", depends, Self::write_depend)
    }

    fn write_pkg_hist(&mut self, h: &PkgHist) -> MarshalResult<()> {
        self.tag("PKG_HIST")?;
        self.field("ph_pkgname", &h.pkgname)?;
        self.num("ph_to_be_removed", flag(h.to_be_removed))?;
        self.num("ph_needs_pkgrm", flag(h.needs_pkgrm))?;
        self.num("ph_basedir_changed", flag(h.basedir_changed))?;
        self.write_string_list("PH_REPLACED_BY", &h.replaced_by)?;
        self.write_string_list("PH_DELETED_FILES", &h.deleted_files)?;
        self.write_string_list("PH_CLUSTER_RM_LIST", &h.cluster_rm_list)?;
        self.write_string_list("PH_IGNORE_LIST", &h.ignore_list)?;
        self.end("PKG_HIST")
    }

    fn write_patch_num(&mut self, p: &PatchNum) -> MarshalResult<()> {
        self.tag("PATCH_NUM")?;
        self.field("patch_num", &p.patch_num)?;
        self.field("rev_num", &p.rev_num)?;
        self.end("PATCH_NUM")
    }

    fn write_pkg_info(&mut self, p: &PkgInfo) -> MarshalResult<()> {
        self.tag("PKG_INFO")?;
        self.field("pi_pkginst", &p.pkginst)?;
        self.opt("pi_name", &p.name)?;
        self.opt("pi_arch", &p.arch)?;
        self.opt("pi_version", &p.version)?;
        self.opt("pi_basedir", &p.basedir)?;
        self.opt("pi_catg", &p.catg)?;
        self.num("pi_status", p.status)?;
        self.end("PKG_INFO")
    }

    fn write_modinfo_nodes(
        &mut self,
        container: &str,
        mods: &[Modinfo],
        key: impl Fn(&Modinfo) -> &str,
    ) -> MarshalResult<()> {
        self.list(container, "MODINFO_NODE_NEXT", mods, |w, m| {
            w.tag("MODINFO_NODE")?;
            w.field("node_key", key(m))?;
            w.write_modinfo(m)?;
            w.end("MODINFO_NODE")
        })
    }

    pub fn write_modinfo(&mut self, m: &Modinfo) -> MarshalResult<()> {
        self.tag("MODINFO")?;
        self.num("m_order", m.order)?;
        self.num("m_status", m.status)?;
        self.num("m_shared", m.shared)?;
        self.num("m_action", m.action)?;
        self.num("m_flags", m.flags)?;
        self.num("m_refcnt", m.refcnt)?;
        self.num("m_sunw_ptype", m.sunw_ptype)?;
        self.field("m_pkgid", m.pkgid.as_str())?;
        self.opt("m_pkginst", &m.pkginst)?;
        self.opt("m_pkg_dir", &m.pkg_dir)?;
        self.opt("m_name", &m.name)?;
        self.opt("m_vendor", &m.vendor)?;
        self.opt("m_version", &m.version)?;
        self.opt("m_prodname", &m.prodname)?;
        self.opt("m_prodvers", &m.prodvers)?;
        self.opt("m_arch", &m.arch)?;
        self.opt("m_expand_arch", &m.expand_arch)?;
        self.opt("m_desc", &m.desc)?;
        self.opt("m_category", &m.category)?;
        self.opt("m_instdate", &m.instdate)?;
        self.opt("m_patchid", &m.patchid)?;
        self.opt("m_locale", &m.locale)?;
        self.opt("m_l10n_pkglist", &m.l10n_pkglist)?;
        self.write_id_list("M_L10N", "L10N", "l10n_package", &m.l10n)?;
        self.write_id_list("M_PKGS_LCLZD", "PKGSLOCALIZED", "pkg_lclzd", &m.pkgs_lclzd)?;
        self.write_modinfo_nodes("M_INSTANCES", &m.instances, |i| {
            i.pkginst.as_deref().unwrap_or(i.pkgid.as_str())
        })?;
        self.write_modinfo_nodes("M_NEXT_PATCH", &m.next_patch, |p| {
            p.patchid.as_deref().unwrap_or(p.pkgid.as_str())
        })?;
        if let Some(of) = &m.patch_of {
            self.field("m_patchof", of.as_str())?;
        }
        self.write_depends("M_PDEPENDS", &m.pdepends)?;
        self.write_depends("M_RDEPENDS", &m.rdepends)?;
        self.write_depends("M_IDEPENDS", &m.idepends)?;
        self.write_depends("M_REV_DEPENDS", &m.rev_depends)?;
        self.write_filepp("M_TEXT", &m.text)?;
        self.write_filepp("M_DEMO", &m.demo)?;
        if let Some(f) = &m.install {
            self.write_filepp("M_INSTALL", std::slice::from_ref(f))?;
        }
        if let Some(f) = &m.icon {
            self.write_filepp("M_ICON", std::slice::from_ref(f))?;
        }
        self.opt("m_basedir", &m.basedir)?;
        self.opt("m_instdir", &m.instdir)?;
        self.list("M_PKG_HIST", "PKG_HIST_NEXT", &m.pkg_hist, Self::write_pkg_hist)?;
        self.num("m_spooled_size", m.spooled_size)?;
        self.num("m_pkgovhd_size", m.pkgovhd_size)?;
        if !m.deflt_fs.is_empty() {
            self.tag("M_DEFLT_FS")?;
            for size in &m.deflt_fs {
                self.num("deflt_fs", size)?;
            }
            self.end("M_DEFLT_FS")?;
        }
        self.list("M_FILEDIFF", "FILEDIFF_NEXT", &m.filediffs, Self::write_filediff)?;
        self.list(
            "M_NEWARCH_PATCHES",
            "PATCH_NUM_NEXT",
            &m.newarch_patches,
            Self::write_patch_num,
        )?;
        self.write_string_list("M_LOC_STRLIST", &m.loc_strlist)?;
        self.write_contents_records("M_FS_USAGE", &m.fs_usage)?;
        if let Some(info) = &m.pkg_info {
            self.write_pkg_info(info)?;
        }
        self.end("MODINFO")
    }

    /// Write a cluster tree node; `stub` keeps only kinds and ids
    pub fn write_module(&mut self, module: &Module, stub: bool) -> MarshalResult<()> {
        self.tag("MODULE")?;
        self.field("type", module.kind.as_str())?;
        self.field("m_pkgid", module.pkgid.as_str())?;
        if !stub {
            self.opt("m_name", &module.name)?;
            self.opt("m_version", &module.version)?;
        }
        self.list("MODULE_SUB", "MODULE_SUB_NEXT", &module.sub, |w, sub| {
            w.write_module(sub, stub)
        })?;
        self.end("MODULE")
    }

    fn write_patch(&mut self, p: &Patch) -> MarshalResult<()> {
        self.tag("PATCH")?;
        self.field("patchid", &p.patchid)?;
        self.num("removed", flag(p.removed))?;
        self.list("PATCH_PKGS", "PATCHPKG_NEXT", &p.patchpkgs, |w, id| {
            w.tag("PATCHPKG")?;
            w.field("patchpkg_mod", id.as_str())?;
            w.end("PATCHPKG")
        })?;
        self.end("PATCH")
    }

    fn write_arch(&mut self, a: &Arch) -> MarshalResult<()> {
        self.tag("ARCH")?;
        self.field("a_arch", &a.name)?;
        self.num("a_selected", flag(a.selected))?;
        self.num("a_loaded", flag(a.loaded))?;
        self.write_string_list("A_PLATFORMS", &a.platforms)?;
        self.end("ARCH")
    }

    fn write_sw_config(&mut self, s: &SwConfig) -> MarshalResult<()> {
        self.tag("SW_CONFIG")?;
        self.field("sw_name", &s.name)?;
        self.write_string_list("SW_MEMBERS", &s.members)?;
        self.end("SW_CONFIG")
    }

    fn write_hw_config(&mut self, h: &HwConfig) -> MarshalResult<()> {
        self.tag("HW_CONFIG")?;
        self.field("hw_node", &h.name)?;
        self.write_string_list("HW_PKGS", &h.pkgs)?;
        self.end("HW_CONFIG")
    }

    fn write_platform(&mut self, p: &Platform) -> MarshalResult<()> {
        self.tag("PLATFORM")?;
        self.field("plat_name", &p.name)?;
        self.opt("plat_model", &p.model)?;
        self.opt("plat_isa", &p.isa)?;
        self.end("PLATFORM")
    }

    fn write_platgroup(&mut self, g: &PlatGroup) -> MarshalResult<()> {
        self.tag("PLATGROUP")?;
        self.field("pltgrp_name", &g.name)?;
        self.opt("pltgrp_isa", &g.isa)?;
        self.num("pltgrp_export", flag(g.export))?;
        self.list("PLTGRP_PLATFORMS", "PLATFORM_NEXT", &g.platforms, Self::write_platform)?;
        self.end("PLATGROUP")
    }

    fn write_locale(&mut self, l: &Locale) -> MarshalResult<()> {
        self.tag("LOCALE")?;
        self.field("locale_name", &l.name)?;
        self.opt("locale_language", &l.language)?;
        self.num("locale_selected", flag(l.selected))?;
        self.end("LOCALE")
    }

    fn write_geo(&mut self, g: &Geo) -> MarshalResult<()> {
        self.tag("GEO")?;
        self.field("geo_name", &g.name)?;
        self.opt("geo_desc", &g.description)?;
        self.num("geo_selected", flag(g.selected))?;
        self.write_string_list("GEO_LOCALES", &g.locales)?;
        self.end("GEO")
    }

    fn write_category(&mut self, c: &Category) -> MarshalResult<()> {
        self.tag("CATEGORY")?;
        self.field("cat_name", &c.name)?;
        self.opt("cat_info", &c.info)?;
        self.end("CATEGORY")
    }

    fn write_cd_info(&mut self, c: &CdInfo) -> MarshalResult<()> {
        self.tag("CD_INFO")?;
        self.field("cd_label", &c.label)?;
        self.opt("cd_release", &c.release)?;
        self.end("CD_INFO")
    }

    fn write_os_info(&mut self, o: &OsInfo) -> MarshalResult<()> {
        self.tag("OS_INFO")?;
        self.field("os_name", &o.name)?;
        self.opt("os_version", &o.version)?;
        self.end("OS_INFO")
    }

    pub fn write_product(&mut self, p: &Product) -> MarshalResult<()> {
        self.tag("PRODUCT")?;
        self.opt("p_name", &p.name)?;
        self.opt("p_version", &p.version)?;
        self.opt("p_rev", &p.rev)?;
        self.num("p_status", p.status)?;
        self.opt("p_id", &p.id)?;
        self.opt("p_pkgdir", &p.pkgdir)?;
        self.opt("p_instdir", &p.instdir)?;
        self.list("P_ARCHES", "ARCH_NEXT", &p.arches, Self::write_arch)?;
        self.list("P_SWCFG", "SW_CONFIG_NEXT", &p.sw_config, Self::write_sw_config)?;
        self.list("P_PLATGRP", "PLATGROUP_NEXT", &p.platgroups, Self::write_platgroup)?;
        if let Some(hw) = &p.hw_config {
            self.write_hw_config(hw)?;
        }
        self.write_modinfo_nodes("P_PACKAGES", &p.packages, |m| m.pkgid.as_str())?;
        let stub = p.is_installed_view();
        self.list("P_CLUSTERS", "MODULE_NODE_NEXT", &p.clusters, |w, module| {
            w.tag("MODULE_NODE")?;
            w.field("node_key", module.pkgid.as_str())?;
            w.write_module(module, stub)?;
            w.end("MODULE_NODE")
        })?;
        self.list("P_LOCALES", "LOCALE_NEXT", &p.locales, Self::write_locale)?;
        self.list("P_GEOS", "GEO_NEXT", &p.geos, Self::write_geo)?;
        if let Some(cd) = &p.cd_info {
            self.write_cd_info(cd)?;
        }
        self.list("P_OSINFO", "OS_INFO_NEXT", &p.os_info, Self::write_os_info)?;
        self.write_modinfo_nodes("P_ORPHAN_PATCH", &p.orphan_patches, |m| {
            m.patchid.as_deref().unwrap_or(m.pkgid.as_str())
        })?;
        self.list("P_CATEGORIES", "CATEGORY_NEXT", &p.categories, Self::write_category)?;
        self.list("P_PATCHES", "PATCH_NEXT", &p.patches, Self::write_patch)?;
        self.write_string_list("P_MODFILE", &p.modfile)?;
        self.opt("p_zonename", &p.zone_name)?;
        self.write_charpp("P_INHERITEDDIRS", &p.inherited_dirs)?;
        self.opt("p_rootdir", &p.rootdir)?;
        self.end("PRODUCT")
    }

    pub fn write_media(&mut self, media: &Media) -> MarshalResult<()> {
        self.tag("MEDIA")?;
        self.num("med_type", media.media_type)?;
        self.num("med_status", media.status)?;
        self.num("med_machine", media.machine)?;
        self.opt("med_device", &media.device)?;
        self.opt("med_dir", &media.dir)?;
        self.opt("med_volume", &media.volume)?;
        self.num("med_flags", media.flags)?;
        self.opt("med_zonename", &media.zone_name)?;
        self.write_string_list("MED_HOSTNAMES", &media.hostnames)?;
        self.list("MED_CATEGORIES", "CATEGORY_NEXT", &media.categories, Self::write_category)?;
        self.list("MED_PRODUCTS", "PRODUCT_NEXT", &media.products, Self::write_product)?;
        self.end("MEDIA")
    }

    /// Mount point, flags and breakdown of one filesystem
    pub(crate) fn write_fsspace_entry(&mut self, fs: &FsSpace) -> MarshalResult<()> {
        self.field("fsp_mntpnt", &fs.mntpnt)?;
        self.num("fsp_flags", fs.flags)?;
        self.write_contents_brkdn(&fs.brkdn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut PipeWriter<Vec<u8>>) -> MarshalResult<()>) -> String {
        let mut w = PipeWriter::new(Vec::new());
        f(&mut w).unwrap();
        String::from_utf8(w.into_inner()).unwrap()
    }

    #[test]
    fn test_depend_list_framing() {
        let mut m = Modinfo::new("SUNWcsu");
        m.pdepends.push(Depend {
            pkgid: "SUNWcsr".into(),
            ..Default::default()
        });
        m.pdepends.push(Depend {
            pkgid: "SUNWcsl".into(),
            version: Some("11".into()),
            arch: None,
        });
        let out = written(|w| w.write_modinfo(&m));
        assert!(out.contains(
            "M_PDEPENDS\nDEPEND\nd_pkgid=SUNWcsr\nEND_DEPEND\nDEPEND_D_NEXT\n\
             DEPEND\nd_pkgid=SUNWcsl\nd_version=11\nEND_DEPEND\nEND_M_PDEPENDS\n"
        ));
        assert!(!out.contains("M_RDEPENDS"));
        assert!(out.starts_with("MODINFO\n"));
        assert!(out.ends_with("END_MODINFO\n"));
    }

    #[test]
    fn test_references_written_by_id() {
        let diff = Filediff {
            owning_pkg: Some("SUNWcsu".into()),
            replacing_pkg: Some("SUNWcsr".into()),
            component_path: "/etc/passwd".into(),
            ..Default::default()
        };
        let out = written(|w| w.write_filediff(&diff));
        assert!(out.contains("replacing_pkg=SUNWcsr\n"));
        assert!(!out.contains("owning_pkg"));
        assert!(out.contains("component_path=/etc/passwd\nEND_FILEDIFF\n"));
    }

    #[test]
    fn test_installed_view_clusters_are_stubs() {
        let cluster = Module::cluster("SUNWCreq", "Core", vec![Module::package("SUNWcsr")]);
        let installed = Product {
            clusters: vec![cluster.clone()],
            ..Default::default()
        };
        let out = written(|w| w.write_product(&installed));
        assert!(!out.contains("m_name=Core"));
        assert!(out.contains("type=PACKAGE\nm_pkgid=SUNWcsr\nEND_MODULE\n"));

        let named = Product {
            name: Some("Solaris".into()),
            clusters: vec![cluster],
            ..Default::default()
        };
        assert!(written(|w| w.write_product(&named)).contains("m_name=Core"));
    }

    #[test]
    fn test_embedded_newline_is_rejected() {
        let mut w = PipeWriter::new(Vec::new());
        let mut m = Modinfo::new("SUNWcsu");
        m.desc = Some("two\nlines".into());
        assert!(matches!(
            w.write_modinfo(&m),
            Err(MarshalError::EmbeddedNewline { field }) if field == "m_desc"
        ));
    }

    #[test]
    fn test_flushes_after_each_composite() {
        struct CountingSink {
            flushes: usize,
        }
        impl Write for CountingSink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                self.flushes += 1;
                Ok(())
            }
        }

        let mut w = PipeWriter::new(CountingSink { flushes: 0 });
        let fs = FsSpace::new("/");
        w.write_fsspace_entry(&fs).unwrap();
        w.write_modinfo(&Modinfo::new("a")).unwrap();
        assert_eq!(w.into_inner().flushes, 2);
    }
}
