// tests/pipe.rs

//! Integration tests streaming the installation model across an OS pipe.

use prodreg::marshal::{
    ContentsBrkdn, Filediff, FsSpace, Media, Modinfo, PackageId, Patch, PipeReader, PipeWriter,
    Product, ZoneMerge, merge_zone_report,
};
use std::io::BufReader;
use std::thread;

fn sample_media() -> Media {
    let mut pkg1 = Modinfo::new("pkg1");
    pkg1.name = Some("Package one".into());
    pkg1.version = Some("1.0".into());
    pkg1.add_filediff(Filediff {
        replacing_pkg: Some(PackageId::new("pkg2")),
        component_path: "/etc/motd".into(),
        exp_mode: 0o644,
        act_mode: 0o600,
        ..Default::default()
    });

    let mut pkg2 = Modinfo::new("pkg2");
    pkg2.name = Some("Package two".into());

    let mut loc = Modinfo::new("pkg1-fr");
    loc.locale = Some("fr".into());
    loc.l10n_pkglist = Some("pkg1:1.0".into());

    let product = Product {
        name: Some("Solaris".into()),
        version: Some("10".into()),
        packages: vec![pkg1, pkg2, loc],
        patches: vec![Patch {
            patchid: "patch1".into(),
            removed: false,
            patchpkgs: vec![PackageId::new("pkg1")],
        }],
        ..Default::default()
    };

    Media {
        dir: Some("/cdrom".into()),
        products: vec![product],
        ..Default::default()
    }
}

#[test]
fn test_media_crosses_a_pipe() {
    let media = sample_media();
    let (rx, tx) = std::io::pipe().unwrap();

    let sent = media.clone();
    let child = thread::spawn(move || {
        let mut writer = PipeWriter::new(tx);
        writer.write_media(&sent).unwrap();
    });

    let mut reader = PipeReader::new(BufReader::new(rx));
    let received = reader.read_media().unwrap();
    child.join().unwrap();

    let product = &received.products[0];
    let pkg1 = product.package(&PackageId::new("pkg1")).unwrap();
    assert!(product.package(&PackageId::new("pkg2")).is_some());

    let patch = &product.patches[0];
    assert_eq!(product.resolve(&patch.patchpkgs[0]).unwrap().pkgid, pkg1.pkgid);

    let diff = &pkg1.filediffs[0];
    assert_eq!(diff.owning_pkg.as_ref(), Some(&pkg1.pkgid));
    let replacing = diff.replacing_pkg.as_ref().unwrap();
    assert_eq!(product.resolve(replacing).unwrap().name.as_deref(), Some("Package two"));

    // Localization links are rebuilt by the reader
    assert_eq!(pkg1.l10n, vec![PackageId::new("pkg1-fr")]);
    assert_eq!(
        product.package(&PackageId::new("pkg1-fr")).unwrap().pkgs_lclzd,
        vec![PackageId::new("pkg1")]
    );
}

#[test]
fn test_zone_report_credits_parent_table() {
    let extra = FsSpace {
        mntpnt: "/".into(),
        flags: 0,
        brkdn: ContentsBrkdn {
            packaged: 1000,
            ..Default::default()
        },
    };
    let used = FsSpace {
        mntpnt: "/".into(),
        flags: 0,
        brkdn: ContentsBrkdn {
            packaged: 500,
            ..Default::default()
        },
    };

    let (rx, tx) = std::io::pipe().unwrap();
    let child = thread::spawn(move || {
        let mut writer = PipeWriter::new(tx);
        writer.write_fsspace_extra(&[extra]).unwrap();
        writer.write_fsspace_zone(&[used]).unwrap();
    });

    let mut table = vec![FsSpace::new("/"), FsSpace::new("/export")];
    table[1].brkdn.packaged = 200;
    let mut merge = ZoneMerge {
        new_media: None,
        installed: None,
        fs_table: &mut table,
        zone_root: "/export/zones/z1/root",
        inherited_dirs: &[],
    };
    let mut reader = PipeReader::new(BufReader::new(rx));
    let summary = merge_zone_report(&mut reader, &mut merge).unwrap();
    child.join().unwrap();

    assert_eq!(summary.fs_records, 2);
    assert_eq!(table[0].brkdn.packaged, 0);
    assert_eq!(table[1].brkdn.packaged, 1700);
}
