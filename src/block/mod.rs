//! 块设备抽象
//!
//! block/device.rs 定义缓存依赖的块设备驱动接口
//! block/ramdisk.rs 提供一个内存实现，供宿主环境和测试使用

mod device;
mod ramdisk;

pub use device::BlockDevice;
pub use ramdisk::RamDisk;
