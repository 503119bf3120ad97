mod common;

use common::{image_path, small_config};
use flatfat::{make_fs, mount_fs, umount_fs, BlockFile, Config, Error};

#[ctor::ctor]
fn init() {
    common::init_log();
}

const MESSAGE: &[u8] = b"Hello, this is a test of your file system!\0";

#[test]
fn write_close_reopen_read_remount() {
    let path = image_path("e2e");
    let config = Config::default();
    make_fs(&path, &config).unwrap();
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        (config.block_size * config.num_blocks) as u64
    );

    let mut fs = mount_fs(&path, &config).unwrap();
    assert!(fs.list().is_empty());
    assert_eq!(fs.free_blocks(), config.num_data_blocks());

    fs.create("myfile").unwrap();
    let fd = fs.open("myfile").unwrap();
    assert_eq!(fs.write(fd, MESSAGE).unwrap(), 43);
    fs.close(fd).unwrap();

    let fd2 = fs.open("myfile").unwrap();
    let mut buf = [0u8; 99];
    assert_eq!(fs.read(fd2, &mut buf).unwrap(), 43);
    assert_eq!(&buf[..43], MESSAGE);
    fs.close(fd2).unwrap();
    umount_fs(fs).unwrap();

    let mut fs = mount_fs(&path, &config).unwrap();
    let fd = fs.open("myfile").unwrap();
    assert_eq!(fs.size(fd).unwrap(), 43);
    umount_fs(fs).unwrap();
}

#[test]
fn second_mount_of_same_image_fails() {
    let path = image_path("double-mount");
    let config = small_config();
    make_fs(&path, &config).unwrap();

    let fs = mount_fs(&path, &config).unwrap();
    assert_eq!(mount_fs(&path, &config).unwrap_err(), Error::DeviceBusy);
    umount_fs(fs).unwrap();
    umount_fs(mount_fs(&path, &config).unwrap()).unwrap();
}

#[test]
fn independent_volumes_in_one_process() {
    let config = small_config();
    let (a, b) = (image_path("vol-a"), image_path("vol-b"));
    make_fs(&a, &config).unwrap();
    make_fs(&b, &config).unwrap();

    let mut fa = mount_fs(&a, &config).unwrap();
    let mut fb = mount_fs(&b, &config).unwrap();
    fa.create("only-a").unwrap();
    fb.create("only-b").unwrap();
    assert!(!fa.exists("only-b"));
    assert!(!fb.exists("only-a"));
    umount_fs(fa).unwrap();
    umount_fs(fb).unwrap();
}

#[test]
fn unmount_closes_open_descriptors() {
    let path = image_path("open-at-unmount");
    let config = small_config();
    make_fs(&path, &config).unwrap();

    let mut fs = mount_fs(&path, &config).unwrap();
    fs.create("x").unwrap();
    let fd = fs.open("x").unwrap();
    fs.write(fd, b"pending").unwrap();
    umount_fs(fs).unwrap();

    let mut fs = mount_fs(&path, &config).unwrap();
    assert_eq!(fs.open_count(), 0);
    assert_eq!(fs.stat("x").unwrap().size, 7);
    fs.delete("x").unwrap();
    umount_fs(fs).unwrap();
}

#[test]
fn mount_needs_a_formatted_image() {
    let path = image_path("unformatted");
    let config = small_config();
    BlockFile::format(&path, config.block_size, config.num_blocks).unwrap();
    assert_eq!(mount_fs(&path, &config).unwrap_err(), Error::InvalidSuperBlock);
    // The failed mount released the device.
    BlockFile::open(&path, config.block_size).unwrap();
}

#[test]
fn make_fs_rejects_bad_config() {
    let path = image_path("bad-config");
    let config = Config { block_size: 100, ..small_config() };
    assert_eq!(make_fs(&path, &config), Err(Error::InvalidConfig));
    assert!(!path.exists());
}
