use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use cuefix::export;
use cuefix::export::ExportMode;
use cuefix::export::Exported;
use cuefix::FixStatus;
use cuefix::FixedRecord;
use cuefix::Fixer;
use cuefix::RawDocument;

const SHEET: &str = "REM GENRE Pop\nPERFORMER \"歌手\"\nTITLE \"专辑\"\nFILE \"01.flac\" WAVE\n  TRACK 01 AUDIO\n    TITLE \"第一首\"\n    INDEX 01 00:00:00\n";

fn write(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn ingest(root: &Path, relative: &str) -> FixedRecord {
    let raw = RawDocument::read(root, &root.join(relative)).unwrap();
    FixedRecord::ingest(Arc::new(raw))
}

#[test]
fn fixes_and_packs_mixed_folder() {
    let input = tempfile::tempdir().unwrap();
    let (gb, _, _) = encoding_rs::GB18030.encode(SHEET);
    write(input.path(), "a/gb.cue", &gb);
    write(input.path(), "b/utf8.cue", SHEET.as_bytes());
    write(input.path(), "b/notes.txt", b"hello world");

    let mut records = vec![
        ingest(input.path(), "a/gb.cue"),
        ingest(input.path(), "b/utf8.cue"),
        ingest(input.path(), "b/notes.txt"),
    ];
    let summary = Fixer::new().fix_all(&mut records);
    assert_eq!(summary.fixed, 3);
    assert_eq!(summary.flagged, 1);
    assert!(records.iter().all(|r| r.status() == FixStatus::Fixed));
    assert_eq!(records[0].detection().unwrap().encoding, "gb18030");
    assert_eq!(records[1].detection().unwrap().encoding, "utf-8");

    let output = tempfile::tempdir().unwrap();
    let exported = export::export(&records, output.path(), ExportMode::Auto).unwrap();
    let archive_path = match exported {
        Exported::Archive(path) => path,
        other => panic!("expected an archive, got {:?}", other),
    };
    let name = archive_path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("Fixed_CUE_Files_") && name.ends_with(".zip"));

    let mut archive = zip::ZipArchive::new(fs::File::open(&archive_path).unwrap()).unwrap();
    assert_eq!(archive.len(), 3);
    let mut bytes = Vec::new();
    archive
        .by_name("a/gb.cue")
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();
    assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
    assert_eq!(std::str::from_utf8(&bytes[3..]).unwrap(), SHEET);
}

#[test]
fn single_record_written_as_file() {
    let input = tempfile::tempdir().unwrap();
    let (big5, _, _) = encoding_rs::BIG5.encode("TITLE \"歌\"\nFILE \"a.wav\" WAVE\n");
    write(input.path(), "disc/one.cue", &big5);

    let mut records = vec![ingest(input.path(), "disc/one.cue")];
    let fixer = Fixer::new();
    fixer.fix_labeled(&mut records[0], "big5");

    let output = tempfile::tempdir().unwrap();
    let exported = export::export(&records, output.path(), ExportMode::Auto).unwrap();
    let target = output.path().join("one.cue");
    assert_eq!(exported, Exported::File(target.clone()));
    assert_eq!(
        fs::read(target).unwrap(),
        export::output_bytes("TITLE \"歌\"\nFILE \"a.wav\" WAVE\n")
    );
}

#[test]
fn tree_export_keeps_structure() {
    let input = tempfile::tempdir().unwrap();
    write(input.path(), "x/y/z.cue", SHEET.as_bytes());
    write(input.path(), "x/w.cue", SHEET.as_bytes());

    let mut records = vec![
        ingest(input.path(), "x/y/z.cue"),
        ingest(input.path(), "x/w.cue"),
    ];
    Fixer::new().fix_all(&mut records);

    let output = tempfile::tempdir().unwrap();
    export::export(&records, output.path(), ExportMode::Tree).unwrap();
    let written = fs::read(output.path().join("x").join("y").join("z.cue")).unwrap();
    assert_eq!(written, export::output_bytes(SHEET));
    assert!(output.path().join("x").join("w.cue").is_file());
}

fn same_path_records() -> Vec<FixedRecord> {
    let (gb, _, _) = encoding_rs::GB18030.encode(SHEET);
    let mut records = vec![
        FixedRecord::ingest(Arc::new(RawDocument::new("album.cue", "album.cue", gb.into_owned()))),
        FixedRecord::ingest(Arc::new(RawDocument::new(
            "album.cue",
            "album.cue",
            b"TITLE \"two\"\nFILE \"b.wav\" WAVE\n".to_vec(),
        ))),
    ];
    Fixer::new().fix_all(&mut records);
    records
}

#[test]
fn shared_relative_path_archived_under_distinct_names() {
    let records = same_path_records();
    let output = tempfile::tempdir().unwrap();
    let archive_path = match export::export(&records, output.path(), ExportMode::Auto).unwrap() {
        Exported::Archive(path) => path,
        other => panic!("expected an archive, got {:?}", other),
    };
    let mut archive = zip::ZipArchive::new(fs::File::open(&archive_path).unwrap()).unwrap();
    assert_eq!(archive.len(), 2);
    let mut first = Vec::new();
    archive
        .by_name("album.cue")
        .unwrap()
        .read_to_end(&mut first)
        .unwrap();
    assert_eq!(first, export::output_bytes(SHEET));
    let mut second = Vec::new();
    archive
        .by_name("album (2).cue")
        .unwrap()
        .read_to_end(&mut second)
        .unwrap();
    assert_eq!(second, export::output_bytes("TITLE \"two\"\nFILE \"b.wav\" WAVE\n"));
}

#[test]
fn shared_relative_path_written_side_by_side() {
    let records = same_path_records();
    let output = tempfile::tempdir().unwrap();
    let exported = export::export(&records, output.path(), ExportMode::Tree).unwrap();
    assert_eq!(
        exported,
        Exported::Tree(vec![
            output.path().join("album.cue"),
            output.path().join("album (2).cue"),
        ])
    );
    assert_eq!(
        fs::read(output.path().join("album.cue")).unwrap(),
        export::output_bytes(SHEET)
    );
    assert_eq!(
        fs::read(output.path().join("album (2).cue")).unwrap(),
        export::output_bytes("TITLE \"two\"\nFILE \"b.wav\" WAVE\n")
    );
}

#[test]
fn folder_name_kept_in_relative_path() {
    let input = tempfile::tempdir().unwrap();
    write(input.path(), "cd1/album.cue", SHEET.as_bytes());
    write(input.path(), "cd2/album.cue", SHEET.as_bytes());

    let first = ingest(input.path(), "cd1/album.cue");
    let second = ingest(input.path(), "cd2/album.cue");
    assert_eq!(first.raw().relative_path(), Path::new("cd1").join("album.cue"));
    assert_eq!(second.raw().relative_path(), Path::new("cd2").join("album.cue"));
}

#[test]
fn nothing_fixed_nothing_exported() {
    let records = vec![FixedRecord::ingest(Arc::new(RawDocument::new(
        "a.cue",
        "a.cue",
        SHEET.as_bytes().to_vec(),
    )))];
    let output = tempfile::tempdir().unwrap();
    let exported = export::export(&records, output.path(), ExportMode::Archive).unwrap();
    assert_eq!(exported, Exported::Nothing);
}
