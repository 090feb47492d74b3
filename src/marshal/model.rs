// src/marshal/model.rs

//! In-memory installation model streamed between installer processes
//!
//! Media hold products, products hold packages (`Modinfo`), clusters,
//! patches and the descriptive trees around them. Cross references between
//! packages are [`PackageId`] handles resolved against the owning product,
//! never pointers, so the graph can be rebuilt from a one-way stream.

use std::fmt;

/// Identity of a package within a product (`m_pkgid`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub String);

impl PackageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Kind of a node in a cluster tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleType {
    #[default]
    Null,
    Media,
    Product,
    Cluster,
    Metacluster,
    Package,
    Locale,
    Geo,
    Category,
}

impl ModuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleType::Null => "NULL",
            ModuleType::Media => "MEDIA",
            ModuleType::Product => "PRODUCT",
            ModuleType::Cluster => "CLUSTER",
            ModuleType::Metacluster => "METACLUSTER",
            ModuleType::Package => "PACKAGE",
            ModuleType::Locale => "LOCALE",
            ModuleType::Geo => "GEO",
            ModuleType::Category => "CATEGORY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "NULL" => ModuleType::Null,
            "MEDIA" => ModuleType::Media,
            "PRODUCT" => ModuleType::Product,
            "CLUSTER" => ModuleType::Cluster,
            "METACLUSTER" => ModuleType::Metacluster,
            "PACKAGE" => ModuleType::Package,
            "LOCALE" => ModuleType::Locale,
            "GEO" => ModuleType::Geo,
            "CATEGORY" => ModuleType::Category,
            _ => return None,
        })
    }
}

/// Byte and inode accounting for one filesystem
///
/// Sizes are signed because rounding deficits can make them negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentsBrkdn {
    pub packaged: i64,
    pub nonpkg: i64,
    pub products: i64,
    pub devfs: i64,
    pub savedfiles: i64,
    pub pkg_ovhd: i64,
    pub patch_ovhd: i64,
    pub inodes_used: u64,
}

impl ContentsBrkdn {
    /// Add every figure of `other` to this one, clamping at the type bounds
    pub fn credit(&mut self, other: &ContentsBrkdn) {
        self.packaged = self.packaged.saturating_add(other.packaged);
        self.nonpkg = self.nonpkg.saturating_add(other.nonpkg);
        self.products = self.products.saturating_add(other.products);
        self.devfs = self.devfs.saturating_add(other.devfs);
        self.savedfiles = self.savedfiles.saturating_add(other.savedfiles);
        self.pkg_ovhd = self.pkg_ovhd.saturating_add(other.pkg_ovhd);
        self.patch_ovhd = self.patch_ovhd.saturating_add(other.patch_ovhd);
        self.inodes_used = self.inodes_used.saturating_add(other.inodes_used);
    }
}

/// Usage of one filesystem index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentsRecord {
    pub index: i32,
    pub brkdn: ContentsBrkdn,
}

/// The filesystem must not be credited
pub const FSP_IGNORE: u32 = 0x0001;

/// Aggregate usage of one mount point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsSpace {
    pub mntpnt: String,
    pub flags: u32,
    pub brkdn: ContentsBrkdn,
}

impl FsSpace {
    pub fn new(mntpnt: impl Into<String>) -> Self {
        Self {
            mntpnt: mntpnt.into(),
            ..Default::default()
        }
    }
}

/// Difference between an installed file and its packaged state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filediff {
    /// Package the diff belongs to; set when attached, never streamed
    pub owning_pkg: Option<PackageId>,
    pub replacing_pkg: Option<PackageId>,
    pub diff_flags: u32,
    pub linkptr: Option<String>,
    pub link_found: Option<String>,
    pub major: u64,
    pub minor: u64,
    pub exp_mode: u32,
    pub act_mode: u32,
    pub exp_uid: u32,
    pub act_uid: u32,
    pub exp_gid: u32,
    pub act_gid: u32,
    pub exp_type: Option<String>,
    pub actual_type: Option<String>,
    pub pkg_class: Option<String>,
    pub component_path: String,
}

/// Prerequisite entry of a package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Depend {
    pub pkgid: String,
    pub version: Option<String>,
    pub arch: Option<String>,
}

/// Upgrade history of a package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PkgHist {
    pub pkgname: String,
    pub replaced_by: Vec<String>,
    pub deleted_files: Vec<String>,
    pub cluster_rm_list: Vec<String>,
    pub ignore_list: Vec<String>,
    pub to_be_removed: bool,
    pub needs_pkgrm: bool,
    pub basedir_changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchNum {
    pub patch_num: String,
    pub rev_num: String,
}

/// A file shipped with a package (copyright text, demos, icons)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    pub path: String,
    pub name: Option<String>,
    pub kind: u32,
}

/// Installed-package record as read from the host package database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PkgInfo {
    pub pkginst: String,
    pub name: Option<String>,
    pub arch: Option<String>,
    pub version: Option<String>,
    pub basedir: Option<String>,
    pub catg: Option<String>,
    pub status: u32,
}

/// One package of a product
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modinfo {
    pub order: i32,
    pub status: u32,
    pub shared: u32,
    pub action: u32,
    pub flags: u32,
    pub refcnt: i32,
    pub sunw_ptype: u32,
    pub pkgid: PackageId,
    pub pkginst: Option<String>,
    pub pkg_dir: Option<String>,
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub version: Option<String>,
    pub prodname: Option<String>,
    pub prodvers: Option<String>,
    pub arch: Option<String>,
    pub expand_arch: Option<String>,
    pub desc: Option<String>,
    pub category: Option<String>,
    pub instdate: Option<String>,
    pub patchid: Option<String>,
    pub locale: Option<String>,
    pub l10n_pkglist: Option<String>,
    /// Localization packages for this package; rebuilt by the product
    pub l10n: Vec<PackageId>,
    /// Packages this localization package localizes; rebuilt by the product
    pub pkgs_lclzd: Vec<PackageId>,
    /// Further installed instances of this package
    pub instances: Vec<Modinfo>,
    /// Patches applied to this package
    pub next_patch: Vec<Modinfo>,
    pub patch_of: Option<PackageId>,
    pub pdepends: Vec<Depend>,
    pub rdepends: Vec<Depend>,
    pub idepends: Vec<Depend>,
    pub rev_depends: Vec<Depend>,
    pub text: Vec<File>,
    pub demo: Vec<File>,
    pub install: Option<File>,
    pub icon: Option<File>,
    pub basedir: Option<String>,
    pub instdir: Option<String>,
    pub pkg_hist: Vec<PkgHist>,
    pub spooled_size: u64,
    pub pkgovhd_size: u64,
    /// Default size per filesystem index
    pub deflt_fs: Vec<i64>,
    pub filediffs: Vec<Filediff>,
    pub newarch_patches: Vec<PatchNum>,
    pub loc_strlist: Vec<String>,
    pub fs_usage: Vec<ContentsRecord>,
    pub pkg_info: Option<PkgInfo>,
}

impl Modinfo {
    pub fn new(pkgid: impl Into<String>) -> Self {
        Self {
            pkgid: PackageId(pkgid.into()),
            ..Default::default()
        }
    }

    /// Attach a diff, recording this package as its owner
    pub fn add_filediff(&mut self, mut diff: Filediff) {
        diff.owning_pkg = Some(self.pkgid.clone());
        self.filediffs.push(diff);
    }
}

/// Node of a cluster tree; package leaves carry only their id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub kind: ModuleType,
    pub pkgid: PackageId,
    pub name: Option<String>,
    pub version: Option<String>,
    pub sub: Vec<Module>,
}

impl Module {
    pub fn package(pkgid: impl Into<String>) -> Self {
        Self {
            kind: ModuleType::Package,
            pkgid: PackageId(pkgid.into()),
            ..Default::default()
        }
    }

    pub fn cluster(id: impl Into<String>, name: impl Into<String>, sub: Vec<Module>) -> Self {
        Self {
            kind: ModuleType::Cluster,
            pkgid: PackageId(id.into()),
            name: Some(name.into()),
            version: None,
            sub,
        }
    }

    /// Copy holding only kinds and ids, as streamed for installed views
    pub fn stub(&self) -> Self {
        Self {
            kind: self.kind,
            pkgid: self.pkgid.clone(),
            name: None,
            version: None,
            sub: self.sub.iter().map(Module::stub).collect(),
        }
    }
}

/// A patch and the packages it delivers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    pub patchid: String,
    pub removed: bool,
    pub patchpkgs: Vec<PackageId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arch {
    pub name: String,
    pub selected: bool,
    pub loaded: bool,
    pub platforms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwConfig {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HwConfig {
    pub name: String,
    pub pkgs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Platform {
    pub name: String,
    pub model: Option<String>,
    pub isa: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatGroup {
    pub name: String,
    pub isa: Option<String>,
    pub export: bool,
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locale {
    pub name: String,
    pub language: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Geo {
    pub name: String,
    pub description: Option<String>,
    pub selected: bool,
    pub locales: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub info: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CdInfo {
    pub label: String,
    pub release: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsInfo {
    pub name: String,
    pub version: Option<String>,
}

/// Top-level aggregate for one installable offering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Product {
    /// `None` for the installed-system view
    pub name: Option<String>,
    pub version: Option<String>,
    pub rev: Option<String>,
    pub status: u32,
    pub id: Option<String>,
    pub pkgdir: Option<String>,
    pub instdir: Option<String>,
    pub arches: Vec<Arch>,
    pub sw_config: Vec<SwConfig>,
    pub platgroups: Vec<PlatGroup>,
    pub hw_config: Option<HwConfig>,
    pub packages: Vec<Modinfo>,
    pub clusters: Vec<Module>,
    pub locales: Vec<Locale>,
    pub geos: Vec<Geo>,
    pub cd_info: Option<CdInfo>,
    pub os_info: Vec<OsInfo>,
    pub orphan_patches: Vec<Modinfo>,
    pub categories: Vec<Category>,
    pub patches: Vec<Patch>,
    pub modfile: Vec<String>,
    pub zone_name: Option<String>,
    pub inherited_dirs: Vec<String>,
    pub rootdir: Option<String>,
}

impl Product {
    /// True for the installed-system view, whose clusters are streamed as stubs
    pub fn is_installed_view(&self) -> bool {
        self.name.is_none()
    }

    /// Package in the product's package list
    pub fn package(&self, id: &PackageId) -> Option<&Modinfo> {
        self.packages.iter().find(|m| m.pkgid == *id)
    }

    pub fn package_mut(&mut self, id: &PackageId) -> Option<&mut Modinfo> {
        self.packages.iter_mut().find(|m| m.pkgid == *id)
    }

    /// Package anywhere in the product: the list, instances or patches
    pub fn resolve(&self, id: &PackageId) -> Option<&Modinfo> {
        self.package(id).or_else(|| {
            self.packages
                .iter()
                .flat_map(|m| m.instances.iter().chain(m.next_patch.iter()))
                .find(|m| m.pkgid == *id)
        })
    }

    /// Rebuild `l10n` and `pkgs_lclzd` from each localization package
    ///
    /// A localization package has `locale` set and names the packages it
    /// localizes in `l10n_pkglist`, separated by commas or spaces, each
    /// optionally suffixed with `:version`.
    pub fn localize_packages(&mut self) {
        for m in &mut self.packages {
            m.l10n.clear();
            m.pkgs_lclzd.clear();
        }

        let mut links = Vec::new();
        for m in &self.packages {
            let (Some(_), Some(list)) = (&m.locale, &m.l10n_pkglist) else {
                continue;
            };
            for entry in list.split([',', ' ']).filter(|s| !s.is_empty()) {
                let base = PackageId::new(entry.split(':').next().unwrap_or(entry));
                if base != m.pkgid && self.package(&base).is_some() {
                    links.push((m.pkgid.clone(), base));
                }
            }
        }

        for (l10n, base) in links {
            if let Some(b) = self.package_mut(&base)
                && !b.l10n.contains(&l10n)
            {
                b.l10n.push(l10n.clone());
            }
            if let Some(l) = self.package_mut(&l10n)
                && !l.pkgs_lclzd.contains(&base)
            {
                l.pkgs_lclzd.push(base);
            }
        }
    }
}

/// A mountable or streamable source of products
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Media {
    pub media_type: u32,
    pub status: u32,
    pub machine: u32,
    pub device: Option<String>,
    pub dir: Option<String>,
    pub volume: Option<String>,
    pub flags: u32,
    pub categories: Vec<Category>,
    pub hostnames: Vec<String>,
    pub zone_name: Option<String>,
    pub products: Vec<Product>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_clamps_at_bounds() {
        let mut total = ContentsBrkdn {
            packaged: i64::MAX - 10,
            nonpkg: i64::MIN + 5,
            inodes_used: u64::MAX - 1,
            ..Default::default()
        };
        total.credit(&ContentsBrkdn {
            packaged: 1000,
            nonpkg: -1000,
            products: 7,
            inodes_used: 3,
            ..Default::default()
        });
        assert_eq!(total.packaged, i64::MAX);
        assert_eq!(total.nonpkg, i64::MIN);
        assert_eq!(total.products, 7);
        assert_eq!(total.inodes_used, u64::MAX);
    }

    #[test]
    fn test_localize_packages() {
        let mut product = Product {
            name: Some("Solaris".into()),
            ..Default::default()
        };
        product.packages.push(Modinfo::new("SUNWcsu"));
        product.packages.push(Modinfo::new("SUNWcsr"));
        let mut fr = Modinfo::new("SUNWfrcsu");
        fr.locale = Some("fr".into());
        fr.l10n_pkglist = Some("SUNWcsu:11.10.0,SUNWcsr SUNWmissing".into());
        product.packages.push(fr);

        product.localize_packages();
        product.localize_packages();

        let csu = product.package(&"SUNWcsu".into()).unwrap();
        assert_eq!(csu.l10n, vec![PackageId::from("SUNWfrcsu")]);
        let fr = product.package(&"SUNWfrcsu".into()).unwrap();
        assert_eq!(
            fr.pkgs_lclzd,
            vec![PackageId::from("SUNWcsu"), PackageId::from("SUNWcsr")]
        );
    }

    #[test]
    fn test_resolve_finds_nested_patches() {
        let mut pkg = Modinfo::new("SUNWcsu");
        pkg.next_patch.push(Modinfo::new("SUNWcsu-patch"));
        let product = Product {
            packages: vec![pkg],
            ..Default::default()
        };
        assert!(product.package(&"SUNWcsu-patch".into()).is_none());
        assert!(product.resolve(&"SUNWcsu-patch".into()).is_some());
        assert!(product.is_installed_view());
    }

    #[test]
    fn test_credit_adds_figures() {
        let mut total = ContentsBrkdn::default();
        let extra = ContentsBrkdn {
            packaged: 1000,
            inodes_used: 4,
            ..Default::default()
        };
        total.credit(&extra);
        total.credit(&ContentsBrkdn {
            packaged: 500,
            nonpkg: -20,
            ..Default::default()
        });
        assert_eq!(total.packaged, 1500);
        assert_eq!(total.nonpkg, -20);
        assert_eq!(total.inodes_used, 4);
    }

    #[test]
    fn test_module_stub() {
        let cluster = Module::cluster("SUNWCreq", "Core", vec![Module::package("SUNWcsr")]);
        let stub = cluster.stub();
        assert_eq!(stub.name, None);
        assert_eq!(stub.sub, vec![Module::package("SUNWcsr")]);
    }
}
