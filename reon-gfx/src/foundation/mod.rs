pub mod debug_utils;
pub mod device;
pub mod instance;
pub mod mem_allocator;
pub mod physical_device;
