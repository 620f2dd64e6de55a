use std::fs;
use std::io::Cursor;
use std::path::Path;

use myfs_lib::types::{BLOCK_SIZE, DIRECT_BLOCKS, INODE_COUNT};
use myfs_lib::{FileSystem, FsError, Geometry};

fn fresh() -> FileSystem<Cursor<Vec<u8>>> {
    FileSystem::format(Cursor::new(Vec::new()), Geometry::DEFAULT).unwrap()
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn create_then_delete_restores_counters() {
    let mut fs = fresh();
    let longest = "n".repeat(255);
    for name in ["a.txt", "notas", "datos.dat", longest.as_str()] {
        let before = fs.usage().unwrap();
        fs.create(name).unwrap();
        fs.overwrite(name, &pattern(3 * BLOCK_SIZE + 1)).unwrap();
        fs.delete(name).unwrap();
        assert_eq!(fs.usage().unwrap(), before, "contadores distintos para {}", name);
    }
    assert!(fs.check().unwrap().is_clean());
}

#[test]
fn overwrite_then_read_returns_same_bytes() {
    let mut fs = fresh();
    fs.create("f").unwrap();
    for len in [0, 1, BLOCK_SIZE - 1, BLOCK_SIZE, BLOCK_SIZE + 1, DIRECT_BLOCKS * BLOCK_SIZE] {
        let data = pattern(len);
        fs.overwrite("f", &data).unwrap();
        assert_eq!(fs.read("f", len + 1).unwrap(), data, "largo {}", len);
    }
}

#[test]
fn second_overwrite_resizes_block_list() {
    let mut fs = fresh();
    fs.create("f").unwrap();

    fs.overwrite("f", &pattern(5 * BLOCK_SIZE)).unwrap();
    let after_first = fs.usage().unwrap().free_blocks;

    fs.overwrite("f", &pattern(2 * BLOCK_SIZE - 10)).unwrap();
    let entry = fs.list().unwrap().into_iter().find(|e| e.name == "f").unwrap();
    assert_eq!(entry.block_count, 2);
    assert_eq!(fs.usage().unwrap().free_blocks, after_first + 3);

    fs.overwrite("f", &pattern(7 * BLOCK_SIZE)).unwrap();
    assert_eq!(fs.stat("f").unwrap().block_count, 7);
    assert_eq!(fs.usage().unwrap().free_blocks, after_first - 2);
    assert!(fs.check().unwrap().is_clean());
}

#[test]
fn create_twice_fails_until_deleted() {
    let mut fs = fresh();
    fs.create("dup").unwrap();
    let before = fs.usage().unwrap();
    assert!(matches!(fs.create("dup"), Err(FsError::AlreadyExists(_))));
    assert_eq!(fs.usage().unwrap(), before);

    fs.delete("dup").unwrap();
    fs.create("dup").unwrap();
}

#[test]
fn inode_table_fills_at_capacity_minus_one() {
    let mut fs = fresh();
    for i in 1..INODE_COUNT {
        assert_eq!(fs.create(&format!("f{}", i)).unwrap(), i as u32);
    }
    assert_eq!(fs.usage().unwrap().free_inodes, 0);
    assert!(matches!(fs.create("uno-mas"), Err(FsError::NoFreeInodes)));
    assert_eq!(fs.list().unwrap().len(), INODE_COUNT - 1);
}

#[test]
fn append_adds_separator_only_when_not_empty() {
    let mut fs = fresh();
    fs.create("con").unwrap();
    fs.overwrite("con", b"bar").unwrap();
    fs.append("con", b"foo").unwrap();
    assert_eq!(fs.stat("con").unwrap().size, 7);
    assert_eq!(fs.read("con", 100).unwrap(), b"bar\nfoo");

    fs.create("vacio").unwrap();
    fs.append("vacio", b"foo").unwrap();
    assert_eq!(fs.stat("vacio").unwrap().size, 3);
    assert_eq!(fs.read("vacio", 100).unwrap(), b"foo");
}

#[test]
fn append_across_block_boundary() {
    let mut fs = fresh();
    fs.create("log").unwrap();
    let head = pattern(BLOCK_SIZE - 2);
    let tail = pattern(10);
    fs.overwrite("log", &head).unwrap();
    fs.append("log", &tail).unwrap();

    let mut expected = head.clone();
    expected.push(b'\n');
    expected.extend_from_slice(&tail);
    assert_eq!(fs.read("log", expected.len() + 1).unwrap(), expected);
    assert_eq!(fs.stat("log").unwrap().block_count, 2);
}

#[test]
fn append_past_limit_is_too_large() {
    let mut fs = fresh();
    fs.create("f").unwrap();
    fs.overwrite("f", &pattern(DIRECT_BLOCKS * BLOCK_SIZE - 1)).unwrap();
    let before = fs.usage().unwrap();

    // El separador ya ocupa el último byte libre
    assert!(matches!(fs.append("f", b"x"), Err(FsError::TooLarge { .. })));
    assert_eq!(fs.usage().unwrap(), before);
    assert_eq!(fs.stat("f").unwrap().size as usize, DIRECT_BLOCKS * BLOCK_SIZE - 1);
}

#[test]
fn oversized_overwrite_leaves_file_untouched() {
    let mut fs = fresh();
    fs.create("f").unwrap();
    fs.overwrite("f", b"contenido previo").unwrap();
    let before_usage = fs.usage().unwrap();
    let before_entry = fs.stat("f").unwrap();

    let err = fs.overwrite("f", &pattern(DIRECT_BLOCKS * BLOCK_SIZE + 1)).unwrap_err();
    assert!(matches!(err, FsError::TooLarge { required: 13, max: 12 }));

    assert_eq!(fs.usage().unwrap(), before_usage);
    assert_eq!(fs.stat("f").unwrap(), before_entry);
    assert_eq!(fs.read("f", 100).unwrap(), b"contenido previo");
}

#[test]
fn read_reserves_room_for_terminator() {
    let mut fs = fresh();
    fs.create("f").unwrap();
    fs.overwrite("f", b"0123456789").unwrap();
    assert_eq!(fs.read("f", 5).unwrap(), b"0123");
    assert_eq!(fs.read("f", 1).unwrap(), b"");
    assert_eq!(fs.read("f", 0).unwrap(), b"");

    fs.create("vacio").unwrap();
    assert!(fs.read("vacio", 10).unwrap().is_empty());
}

#[test]
fn open_rejects_foreign_geometry() {
    let small = Geometry { block_size: 512, inode_count: 16, block_count: 64 };
    let fs = FileSystem::format(Cursor::new(Vec::new()), small).unwrap();
    let store = fs.close().unwrap();
    assert!(matches!(FileSystem::open(store, Geometry::DEFAULT), Err(FsError::InvalidImage(_))));
}

#[test]
fn scenario_on_image_file() {
    let test_dir = "test_scenario_img";
    let _ = fs::remove_dir_all(test_dir); // Limpieza inicial
    fs::create_dir_all(test_dir).unwrap();
    let path = Path::new(test_dir).join("disk.img");

    FileSystem::format_path(&path).expect("Fallo al formatear");
    let mut myfs = FileSystem::open_path(&path).expect("Fallo al abrir");

    myfs.create("a.txt").unwrap();
    myfs.overwrite("a.txt", &pattern(5000)).unwrap();

    let listing = myfs.list().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].name, "a.txt");
    assert_eq!(listing[0].block_count, 2);
    assert_eq!(listing[0].size, 5000);

    let before = myfs.usage().unwrap();
    myfs.delete("a.txt").unwrap();
    let after = myfs.usage().unwrap();
    assert_eq!(after.free_blocks, before.free_blocks + 2);
    assert_eq!(after.free_inodes, before.free_inodes + 1);
    myfs.close().unwrap();

    // Lo escrito sobrevive a cerrar y reabrir
    let mut reopened = FileSystem::open_path(&path).unwrap();
    assert!(reopened.list().unwrap().is_empty());
    assert!(reopened.check().unwrap().is_clean());
    drop(reopened);

    let _ = fs::remove_dir_all(test_dir);
}
