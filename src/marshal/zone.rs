// src/marshal/zone.rs

//! Zone analysis report
//!
//! A child running inside a non-global zone computes package overhead and
//! filesystem usage and streams them to its parent as four kinds of framed
//! section, in any order:
//!
//! - `NEWMEDIA_PKGOVHD`: per package of the new media product, its
//!   `m_fs_usage`, `m_pkgovhd_size` and `m_spooled_size`
//! - `PROD_PKGOVHD`: per installed package, instance or patch, its
//!   `m_pkgovhd_size`
//! - `FSSPACE_EXTRA` / `FSSPACE_ZONE`: filesystem figures, closed by
//!   `END_FSSPACE`
//! - `FILEDIFF`: one diff, led by its `owning_pkg`
//!
//! The parent merges each section into its own model as it arrives.

use super::error::{MarshalError, MarshalResult, Record};
use super::model::{ContentsRecord, FSP_IGNORE, Filediff, FsSpace, Modinfo, PackageId, Product};
use super::reader::{Line, PipeReader, brkdn_field, num};
use super::writer::PipeWriter;
use std::io::{BufRead, Write};
use tracing::{debug, info, warn};

const NEWMEDIA_PKGOVHD: &str = "NEWMEDIA_PKGOVHD";
const PROD_PKGOVHD: &str = "PROD_PKGOVHD";
const FSSPACE_EXTRA: &str = "FSSPACE_EXTRA";
const FSSPACE_ZONE: &str = "FSSPACE_ZONE";
const FSSPACE_END: &str = "END_FSSPACE";

/// Overhead figures for one package, as carried by the overhead sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PkgOverhead {
    pub pkgid: PackageId,
    pub pkginst: Option<String>,
    pub patchid: Option<String>,
    pub fs_usage: Vec<ContentsRecord>,
    pub pkgovhd_size: u64,
    pub spooled_size: u64,
}

impl<W: Write> PipeWriter<W> {
    /// Overhead of every package of the new media product
    pub fn write_newmedia_pkgovhd(&mut self, product: &Product) -> MarshalResult<()> {
        self.tag(NEWMEDIA_PKGOVHD)?;
        for m in &product.packages {
            self.field("m_pkgid", m.pkgid.as_str())?;
            self.write_contents_records("M_FS_USAGE", &m.fs_usage)?;
            self.num("m_pkgovhd_size", m.pkgovhd_size)?;
            self.num("m_spooled_size", m.spooled_size)?;
        }
        self.end(NEWMEDIA_PKGOVHD)
    }

    fn write_installed_ovhd(&mut self, pkgid: &PackageId, m: &Modinfo) -> MarshalResult<()> {
        self.field("m_pkgid", pkgid.as_str())?;
        if let Some(inst) = &m.pkginst {
            self.field("m_pkginst", inst)?;
        }
        if let Some(patch) = &m.patchid {
            self.field("m_patchid", patch)?;
        }
        self.num("m_pkgovhd_size", m.pkgovhd_size)
    }

    /// Overhead of every installed package, its instances and its patches
    pub fn write_prod_pkgovhd(&mut self, installed: &Product) -> MarshalResult<()> {
        self.tag(PROD_PKGOVHD)?;
        for m in &installed.packages {
            self.write_installed_ovhd(&m.pkgid, m)?;
            for inst in &m.instances {
                self.write_installed_ovhd(&m.pkgid, inst)?;
            }
            for patch in &m.next_patch {
                self.write_installed_ovhd(&m.pkgid, patch)?;
            }
        }
        self.end(PROD_PKGOVHD)
    }

    fn write_fsspace_section(&mut self, tag: &str, table: &[FsSpace]) -> MarshalResult<()> {
        self.tag(tag)?;
        for fs in table {
            self.write_fsspace_entry(fs)?;
        }
        self.close(FSSPACE_END)
    }

    /// Space needed outside any package
    pub fn write_fsspace_extra(&mut self, table: &[FsSpace]) -> MarshalResult<()> {
        self.write_fsspace_section(FSSPACE_EXTRA, table)
    }

    /// Space currently used inside the zone
    pub fn write_fsspace_zone(&mut self, table: &[FsSpace]) -> MarshalResult<()> {
        self.write_fsspace_section(FSSPACE_ZONE, table)
    }

    /// One diff per `FILEDIFF` section, led by its owner
    pub fn write_zone_filediffs(&mut self, installed: &Product) -> MarshalResult<()> {
        for m in &installed.packages {
            for diff in &m.filediffs {
                self.tag("FILEDIFF")?;
                self.field("owning_pkg", m.pkgid.as_str())?;
                self.write_filediff_body(diff)?;
                self.end("FILEDIFF")?;
            }
        }
        Ok(())
    }
}

/// Where the parent merges a zone report
#[derive(Debug)]
pub struct ZoneMerge<'a> {
    /// Product of the media being installed
    pub new_media: Option<&'a mut Product>,
    /// Installed view of the zone
    pub installed: Option<&'a mut Product>,
    /// Parent's file-space table
    pub fs_table: &'a mut Vec<FsSpace>,
    /// Zone root as seen from the parent
    pub zone_root: &'a str,
    /// Directories shared read-only with the global zone
    pub inherited_dirs: &'a [String],
}

/// What a merge did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub packages: usize,
    pub fs_records: usize,
    pub filediffs: usize,
    pub skipped: usize,
}

fn under(path: &str, dir: &str) -> bool {
    dir == "/"
        || path == dir
        || (path.starts_with(dir) && path[dir.len()..].starts_with('/'))
}

/// Path of a zone mount point as seen from the parent
fn zone_path(zone_root: &str, mntpnt: &str) -> String {
    let root = zone_root.trim_end_matches('/');
    match (root.is_empty(), mntpnt) {
        (true, _) => mntpnt.to_string(),
        (false, "/") => root.to_string(),
        (false, m) => format!("{root}{m}"),
    }
}

/// Credit one zone filesystem record to the parent's table
///
/// Records flagged [`FSP_IGNORE`] and records for directories inherited
/// from the global zone are already counted by the parent and are skipped.
/// Everything else goes to the deepest parent mount point holding the zone
/// path. Returns whether the record was credited.
pub fn credit_fs(
    table: &mut [FsSpace],
    zone_root: &str,
    inherited_dirs: &[String],
    record: &FsSpace,
) -> bool {
    if record.flags & FSP_IGNORE != 0 {
        debug!("Ignoring zone filesystem {}", record.mntpnt);
        return false;
    }
    if inherited_dirs
        .iter()
        .any(|dir| record.mntpnt != "/" && under(&record.mntpnt, dir))
    {
        debug!("Skipping inherited zone filesystem {}", record.mntpnt);
        return false;
    }

    let path = zone_path(zone_root, &record.mntpnt);
    match table
        .iter_mut()
        .filter(|fs| under(&path, &fs.mntpnt))
        .max_by_key(|fs| fs.mntpnt.len())
    {
        Some(fs) => {
            fs.brkdn.credit(&record.brkdn);
            true
        }
        None => {
            warn!("No filesystem holds zone path {}", path);
            false
        }
    }
}

fn locate_installed<'a>(product: &'a mut Product, entry: &PkgOverhead) -> Option<&'a mut Modinfo> {
    let pkg = product.package_mut(&entry.pkgid)?;
    if let Some(patchid) = &entry.patchid {
        return pkg
            .next_patch
            .iter_mut()
            .find(|p| p.patchid.as_deref() == Some(patchid.as_str()));
    }
    match &entry.pkginst {
        Some(inst) if pkg.pkginst.as_deref() != Some(inst.as_str()) => pkg
            .instances
            .iter_mut()
            .find(|i| i.pkginst.as_deref() == Some(inst.as_str())),
        _ => Some(pkg),
    }
}

impl<R: BufRead> PipeReader<R> {
    fn read_overhead(&mut self, record: Record, end: &str) -> MarshalResult<Vec<PkgOverhead>> {
        self.read_body(record, end, |r, list: &mut Vec<PkgOverhead>, line| {
            if let Line::Field("m_pkgid", v) = line {
                list.push(PkgOverhead {
                    pkgid: PackageId::new(v),
                    ..Default::default()
                });
                return Ok(true);
            }
            let Some(entry) = list.last_mut() else {
                return Ok(false);
            };
            match line {
                Line::Field("m_pkginst", v) => entry.pkginst = Some(v.to_string()),
                Line::Field("m_patchid", v) => entry.patchid = Some(v.to_string()),
                Line::Field(name @ "m_pkgovhd_size", v) => entry.pkgovhd_size = num(name, v)?,
                Line::Field(name @ "m_spooled_size", v) => entry.spooled_size = num(name, v)?,
                Line::Tag(tag @ "M_FS_USAGE") => entry.fs_usage = r.read_contents_records(tag)?,
                _ => return Ok(false),
            }
            Ok(true)
        })
    }

    fn read_fsspace_section(&mut self) -> MarshalResult<Vec<FsSpace>> {
        self.read_body(Record::FsSpace, FSSPACE_END, |r, table: &mut Vec<FsSpace>, line| {
            if let Line::Field("fsp_mntpnt", v) = line {
                table.push(FsSpace::new(v));
                return Ok(true);
            }
            let Some(fs) = table.last_mut() else {
                return Ok(false);
            };
            match line {
                Line::Field(name @ "fsp_flags", v) => fs.flags = num(name, v)?,
                Line::Field(name, v) => return brkdn_field(&mut fs.brkdn, name, v),
                Line::Tag("CONTENTSBRKDN") => fs.brkdn = r.contents_brkdn_body()?,
                Line::Tag(_) => return Ok(false),
            }
            Ok(true)
        })
    }
}

/// Merge a zone report into the parent's model, reading until end of stream
///
/// The parent's model is only updated once the whole report has been read;
/// on error it is left as it was.
pub fn merge_zone_report<R: BufRead>(
    reader: &mut PipeReader<R>,
    target: &mut ZoneMerge<'_>,
) -> MarshalResult<MergeSummary> {
    let mut new_media = target.new_media.as_deref().cloned();
    let mut installed = target.installed.as_deref().cloned();
    let mut fs_table = target.fs_table.clone();
    let mut scratch = ZoneMerge {
        new_media: new_media.as_mut(),
        installed: installed.as_mut(),
        fs_table: &mut fs_table,
        zone_root: target.zone_root,
        inherited_dirs: target.inherited_dirs,
    };
    let summary = merge_sections(reader, &mut scratch)?;

    if let (Some(dst), Some(merged)) = (target.new_media.as_deref_mut(), new_media) {
        *dst = merged;
    }
    if let (Some(dst), Some(merged)) = (target.installed.as_deref_mut(), installed) {
        *dst = merged;
    }
    *target.fs_table = fs_table;

    info!(
        "Merged zone report: {} packages, {} filesystem records, {} diffs, {} skipped",
        summary.packages, summary.fs_records, summary.filediffs, summary.skipped
    );
    Ok(summary)
}

fn merge_sections<R: BufRead>(
    reader: &mut PipeReader<R>,
    target: &mut ZoneMerge<'_>,
) -> MarshalResult<MergeSummary> {
    let mut summary = MergeSummary::default();

    while let Some(line) = reader.next_line()? {
        match line.as_str() {
            "" => continue,
            NEWMEDIA_PKGOVHD => {
                let end = format!("END_{NEWMEDIA_PKGOVHD}");
                for entry in reader.read_overhead(Record::NewMediaPkgOvhd, &end)? {
                    let found = target
                        .new_media
                        .as_deref_mut()
                        .and_then(|p| p.package_mut(&entry.pkgid));
                    match found {
                        Some(m) => {
                            m.fs_usage = entry.fs_usage;
                            m.pkgovhd_size = entry.pkgovhd_size;
                            m.spooled_size = entry.spooled_size;
                            summary.packages += 1;
                        }
                        None => {
                            warn!("Zone reported unknown new package {}", entry.pkgid);
                            summary.skipped += 1;
                        }
                    }
                }
            }
            PROD_PKGOVHD => {
                let end = format!("END_{PROD_PKGOVHD}");
                for entry in reader.read_overhead(Record::ProdPkgOvhd, &end)? {
                    let found = target
                        .installed
                        .as_deref_mut()
                        .and_then(|p| locate_installed(p, &entry));
                    match found {
                        Some(m) => {
                            m.pkgovhd_size = entry.pkgovhd_size;
                            summary.packages += 1;
                        }
                        None => {
                            warn!("Zone reported unknown installed package {}", entry.pkgid);
                            summary.skipped += 1;
                        }
                    }
                }
            }
            FSSPACE_EXTRA | FSSPACE_ZONE => {
                for record in reader.read_fsspace_section()? {
                    if credit_fs(target.fs_table, target.zone_root, target.inherited_dirs, &record) {
                        summary.fs_records += 1;
                    } else {
                        summary.skipped += 1;
                    }
                }
            }
            "FILEDIFF" => {
                let mut diff: Filediff = reader.filediff_body()?;
                let Some(owner) = diff.owning_pkg.take() else {
                    return Err(MarshalError::ReadFailed {
                        record: Record::Filediff,
                        line: "END_FILEDIFF".to_string(),
                    });
                };
                let found = target
                    .installed
                    .as_deref_mut()
                    .and_then(|p| p.package_mut(&owner));
                match found {
                    Some(m) => {
                        m.add_filediff(diff);
                        summary.filediffs += 1;
                    }
                    None => {
                        warn!("Zone reported a diff for unknown package {}", owner);
                        summary.skipped += 1;
                    }
                }
            }
            _ => return Err(MarshalError::InvalidLine { line }),
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::model::ContentsBrkdn;
    use std::io::Cursor;

    fn fs(mntpnt: &str, packaged: i64) -> FsSpace {
        FsSpace {
            mntpnt: mntpnt.to_string(),
            flags: 0,
            brkdn: ContentsBrkdn {
                packaged,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_credit_policy() {
        let mut table = vec![fs("/", 0), fs("/export", 0)];
        let inherited = vec!["/usr".to_string()];

        assert!(credit_fs(&mut table, "/zones/z1/root", &inherited, &fs("/", 10)));
        assert!(credit_fs(&mut table, "/export/z2/root", &inherited, &fs("/opt", 7)));
        assert!(!credit_fs(&mut table, "/zones/z1/root", &inherited, &fs("/usr", 99)));
        assert!(!credit_fs(&mut table, "/zones/z1/root", &inherited, &fs("/usr/lib", 99)));
        let mut ignored = fs("/var", 99);
        ignored.flags = FSP_IGNORE;
        assert!(!credit_fs(&mut table, "/zones/z1/root", &inherited, &ignored));

        assert_eq!(table[0].brkdn.packaged, 10);
        assert_eq!(table[1].brkdn.packaged, 7);
    }

    #[test]
    fn test_fsspace_sections_credit_root() {
        let stream = "FSSPACE_EXTRA\nfsp_mntpnt=/\nfsp_flags=0\nCONTENTSBRKDN\n\
                      contents_packaged=1000\ncontents_inodes_used=3\nEND_CONTENTSBRKDN\n\
                      END_FSSPACE\nFSSPACE_ZONE\nfsp_mntpnt=/\ncontents_packaged=500\n\
                      END_FSSPACE\n";
        let mut table = vec![fs("/", 200), fs("/export", 0)];
        let mut target = ZoneMerge {
            new_media: None,
            installed: None,
            fs_table: &mut table,
            zone_root: "/zones/z1/root",
            inherited_dirs: &[],
        };
        let mut reader = PipeReader::new(Cursor::new(stream));
        let summary = merge_zone_report(&mut reader, &mut target).unwrap();

        assert_eq!(summary.fs_records, 2);
        assert_eq!(table[0].brkdn.packaged, 1700);
        assert_eq!(table[0].brkdn.inodes_used, 3);
        assert_eq!(table[1].brkdn.packaged, 0);
    }

    #[test]
    fn test_child_report_round_trip() {
        let mut child_new = Product {
            name: Some("Solaris".into()),
            ..Default::default()
        };
        let mut pkg = Modinfo::new("SUNWcsu");
        pkg.pkgovhd_size = 12;
        pkg.spooled_size = 34;
        pkg.fs_usage.push(ContentsRecord {
            index: 1,
            brkdn: ContentsBrkdn {
                packaged: 2048,
                ..Default::default()
            },
        });
        child_new.packages.push(pkg);
        child_new.packages.push(Modinfo::new("SUNWnew"));

        let mut child_installed = Product::default();
        let mut installed_pkg = Modinfo::new("SUNWcsu");
        installed_pkg.pkginst = Some("SUNWcsu".into());
        installed_pkg.pkgovhd_size = 5;
        let mut patch = Modinfo::new("SUNWcsu");
        patch.patchid = Some("119254-01".into());
        patch.pkgovhd_size = 6;
        installed_pkg.next_patch.push(patch);
        installed_pkg.add_filediff(Filediff {
            component_path: "/etc/passwd".into(),
            act_mode: 0o600,
            ..Default::default()
        });
        child_installed.packages.push(installed_pkg);

        let mut w = PipeWriter::new(Vec::new());
        w.write_zone_filediffs(&child_installed).unwrap();
        w.write_newmedia_pkgovhd(&child_new).unwrap();
        w.write_fsspace_zone(&[fs("/", 500)]).unwrap();
        w.write_prod_pkgovhd(&child_installed).unwrap();
        let stream = w.into_inner();

        let mut parent_new = Product {
            name: Some("Solaris".into()),
            packages: vec![Modinfo::new("SUNWcsu")],
            ..Default::default()
        };
        let mut parent_installed = Product::default();
        let mut parent_pkg = Modinfo::new("SUNWcsu");
        parent_pkg.pkginst = Some("SUNWcsu".into());
        let mut parent_patch = Modinfo::new("SUNWcsu");
        parent_patch.patchid = Some("119254-01".into());
        parent_pkg.next_patch.push(parent_patch);
        parent_installed.packages.push(parent_pkg);
        let mut table = vec![fs("/", 0)];

        let mut target = ZoneMerge {
            new_media: Some(&mut parent_new),
            installed: Some(&mut parent_installed),
            fs_table: &mut table,
            zone_root: "/zones/z1/root",
            inherited_dirs: &[],
        };
        let mut reader = PipeReader::new(Cursor::new(stream));
        let summary = merge_zone_report(&mut reader, &mut target).unwrap();
        assert_eq!(summary.filediffs, 1);
        assert_eq!(summary.packages, 3);
        assert_eq!(summary.skipped, 1);

        let new_pkg = &parent_new.packages[0];
        assert_eq!(new_pkg.pkgovhd_size, 12);
        assert_eq!(new_pkg.spooled_size, 34);
        assert_eq!(new_pkg.fs_usage[0].brkdn.packaged, 2048);

        let installed = &parent_installed.packages[0];
        assert_eq!(installed.pkgovhd_size, 5);
        assert_eq!(installed.next_patch[0].pkgovhd_size, 6);
        assert_eq!(installed.filediffs[0].component_path, "/etc/passwd");
        assert_eq!(installed.filediffs[0].owning_pkg, Some(PackageId::from("SUNWcsu")));
        assert_eq!(table[0].brkdn.packaged, 500);
    }

    #[test]
    fn test_failed_report_leaves_parent_untouched() {
        let stream = "FILEDIFF\nowning_pkg=SUNWcsu\ncomponent_path=/etc/passwd\nEND_FILEDIFF\n\
                      FSSPACE_ZONE\nfsp_mntpnt=/\ncontents_packaged=500\nEND_FSSPACE\n\
                      BOGUS\n";
        let mut installed = Product {
            packages: vec![Modinfo::new("SUNWcsu")],
            ..Default::default()
        };
        let mut table = vec![fs("/", 200)];
        let mut target = ZoneMerge {
            new_media: None,
            installed: Some(&mut installed),
            fs_table: &mut table,
            zone_root: "/zones/z1/root",
            inherited_dirs: &[],
        };
        let mut reader = PipeReader::new(Cursor::new(stream));
        assert!(matches!(
            merge_zone_report(&mut reader, &mut target),
            Err(MarshalError::InvalidLine { .. })
        ));

        assert_eq!(table[0].brkdn.packaged, 200);
        assert!(installed.packages[0].filediffs.is_empty());
    }

    #[test]
    fn test_unknown_section() {
        let mut table = Vec::new();
        let mut target = ZoneMerge {
            new_media: None,
            installed: None,
            fs_table: &mut table,
            zone_root: "/",
            inherited_dirs: &[],
        };
        let mut reader = PipeReader::new(Cursor::new("MEDIA\n"));
        assert!(matches!(
            merge_zone_report(&mut reader, &mut target),
            Err(MarshalError::InvalidLine { .. })
        ));
    }
}
