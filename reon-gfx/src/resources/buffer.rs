use ash::vk;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::{ffi::c_void, rc::Rc};
use vk_mem::Alloc;

use crate::commands::command_buffer::GfxCommandBuffer;
use crate::error::RenderResult;
use crate::foundation::{device::GfxDevice, mem_allocator::GfxMemAllocator};
use crate::gfx::Gfx;

/// 定义一个 macro，自动为各种派生 buffer 类型实现 Deref 和 DerefMut
macro_rules! impl_deref_buffer {
    ($name:ident, $target:ty, $inner:ident) => {
        impl Deref for $name {
            type Target = $target;

            fn deref(&self) -> &Self::Target {
                &self.$inner
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.$inner
            }
        }
    };
}

pub struct GfxBufferCreateInfo {
    inner: vk::BufferCreateInfo<'static>,
}
impl GfxBufferCreateInfo {
    #[inline]
    pub fn new(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self {
            inner: vk::BufferCreateInfo {
                size,
                usage,
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn info(&self) -> &vk::BufferCreateInfo {
        &self.inner
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.inner.size
    }
}

pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,

    map_ptr: Option<*mut u8>,
    size: vk::DeviceSize,

    debug_name: String,

    allocator: Rc<GfxMemAllocator>,
    _device: Rc<GfxDevice>,

    _buffer_info: Rc<GfxBufferCreateInfo>,
    _alloc_info: Rc<vk_mem::AllocationCreateInfo>,
}
impl Drop for GfxBuffer {
    fn drop(&mut self) {
        unsafe {
            self.allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
    }
}
// constructor & getter & builder
impl GfxBuffer {
    /// # param
    /// * align: 当 buffer 处于一个大的 memory block 中时，align 用来指定 buffer 的起始 offset
    pub fn new(
        gfx: &Gfx,
        buffer_ci: Rc<GfxBufferCreateInfo>,
        alloc_ci: Rc<vk_mem::AllocationCreateInfo>,
        align: Option<vk::DeviceSize>,
        debug_name: impl AsRef<str>,
    ) -> RenderResult<Self> {
        unsafe {
            let (buffer, allocation) = if let Some(offset_align) = align {
                gfx.allocator.create_buffer_with_alignment(buffer_ci.info(), &alloc_ci, offset_align)?
            } else {
                gfx.allocator.create_buffer(buffer_ci.info(), &alloc_ci)?
            };

            gfx.device.debug_utils.set_object_debug_name(buffer, debug_name.as_ref());
            Ok(Self {
                handle: buffer,
                allocation,
                map_ptr: None,
                size: buffer_ci.size(),
                debug_name: debug_name.as_ref().to_string(),
                allocator: gfx.allocator.clone(),
                _device: gfx.device.clone(),
                _buffer_info: buffer_ci,
                _alloc_info: alloc_ci,
            })
        }
    }

    #[inline]
    pub fn new_device_buffer(
        gfx: &Gfx,
        size: vk::DeviceSize,
        flags: vk::BufferUsageFlags,
        debug_name: impl AsRef<str>,
    ) -> RenderResult<Self> {
        Self::new(
            gfx,
            Rc::new(GfxBufferCreateInfo::new(size, flags)),
            Rc::new(vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            }),
            None,
            debug_name,
        )
    }

    #[inline]
    pub fn new_stage_buffer(gfx: &Gfx, size: vk::DeviceSize, debug_name: impl AsRef<str>) -> RenderResult<Self> {
        Self::new(
            gfx,
            Rc::new(GfxBufferCreateInfo::new(size, vk::BufferUsageFlags::TRANSFER_SRC)),
            Rc::new(vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::Auto,
                flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
                ..Default::default()
            }),
            None,
            debug_name,
        )
    }

    #[inline]
    pub fn new_index_buffer(gfx: &Gfx, size: usize, debug_name: impl AsRef<str>) -> RenderResult<Self> {
        Self::new_device_buffer(
            gfx,
            size as vk::DeviceSize,
            vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            debug_name,
        )
    }

    #[inline]
    pub fn new_vertex_buffer(gfx: &Gfx, size: usize, debug_name: impl AsRef<str>) -> RenderResult<Self> {
        Self::new_device_buffer(
            gfx,
            size as vk::DeviceSize,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            debug_name,
        )
    }

    // getter
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}
impl GfxBuffer {
    #[inline]
    pub fn mapped_ptr(&self) -> Option<*mut u8> {
        self.map_ptr
    }

    #[inline]
    pub fn map(&mut self) -> RenderResult<()> {
        if self.map_ptr.is_some() {
            return Ok(());
        }
        unsafe {
            self.map_ptr = Some(self.allocator.map_memory(&mut self.allocation)?);
        }
        Ok(())
    }

    #[inline]
    pub fn flush(&mut self, offset: vk::DeviceSize, size: vk::DeviceSize) -> RenderResult<()> {
        self.allocator.flush_allocation(&self.allocation, offset, size)?;
        Ok(())
    }

    #[inline]
    pub fn unmap(&mut self) {
        if self.map_ptr.is_none() {
            return;
        }
        unsafe {
            self.allocator.unmap_memory(&mut self.allocation);
            self.map_ptr = None;
        }
    }

    /// 通过 mem map 的方式将 data 传入到 buffer 中
    ///
    /// 注：确保 buffer 内存的对齐方式和 T 保持一致
    pub fn transfer_data_by_mem_map<T>(&mut self, data: &[T]) -> RenderResult<()>
    where
        T: Sized + Copy,
    {
        self.map()?;
        unsafe {
            // 这里的 size 是目标内存的最大 size
            // align 表示目标内存位置额外的内存对齐要求，这里使用 align_of 表示和 rust 中 T 保持一致
            let mut slice =
                ash::util::Align::new(self.map_ptr.unwrap() as *mut c_void, align_of::<T>() as u64, self.size);
            slice.copy_from_slice(data);
            self.allocator.flush_allocation(&self.allocation, 0, size_of_val(data) as vk::DeviceSize)?;
        }
        self.unmap();
        Ok(())
    }

    /// 创建一个临时的 stage buffer，先将数据放入 stage buffer，再 transfer 到 self
    ///
    /// sync 表示这个函数是同步等待的，会阻塞运行
    ///
    /// # Note
    /// * 避免使用这个将 *小块* 数据从内存传到 GPU，推荐使用 cmd transfer
    /// * 这个应该是用来传输大块数据的
    pub fn transfer_data_sync(&mut self, gfx: &Gfx, data: &[impl Sized + Copy]) -> RenderResult<()> {
        let mut stage_buffer = Self::new_stage_buffer(
            gfx,
            size_of_val(data) as vk::DeviceSize,
            format!("{}-stage-buffer", self.debug_name),
        )?;

        stage_buffer.transfer_data_by_mem_map(data)?;

        let cmd_name = format!("{}-transfer-data", &self.debug_name);
        GfxCommandBuffer::one_time_exec(
            gfx.device.clone(),
            gfx.temp_graphics_command_pool.clone(),
            &gfx.graphics_queue,
            |cmd| {
                cmd.cmd_copy_buffer(
                    &stage_buffer,
                    self,
                    &[vk::BufferCopy {
                        size: size_of_val(data) as vk::DeviceSize,
                        ..Default::default()
                    }],
                );
            },
            &cmd_name,
        )?;
        Ok(())
    }

    /// 默认的 descriptor buffer info
    #[inline]
    pub fn get_descriptor_buffer_info_ubo<T: Sized>(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo::default().buffer(self.handle).offset(0).range(size_of::<T>() as vk::DeviceSize)
    }

    /// 覆盖整个 buffer 的 descriptor info，用于 storage buffer
    #[inline]
    pub fn get_descriptor_buffer_info_full(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo::default().buffer(self.handle).offset(0).range(self.size)
    }
}

/// buffer 内存放的是结构体或者结构体的数组
pub struct GfxStructuredBuffer<T: bytemuck::Pod> {
    inner: GfxBuffer,
    /// 结构体的数量
    len: usize,
    _phantom: PhantomData<T>,
}
impl<T: bytemuck::Pod> Deref for GfxStructuredBuffer<T> {
    type Target = GfxBuffer;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
impl<T: bytemuck::Pod> DerefMut for GfxStructuredBuffer<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
impl<T: bytemuck::Pod> GfxStructuredBuffer<T> {
    /// host visible 且持久 mapped 的 UBO，每帧直接写入
    #[inline]
    pub fn new_ubo_mapped(gfx: &Gfx, len: usize, debug_name: impl AsRef<str>) -> RenderResult<Self> {
        let mut buffer = Self::new(gfx, debug_name, len, vk::BufferUsageFlags::UNIFORM_BUFFER, true)?;
        buffer.inner.map()?;
        Ok(buffer)
    }

    /// device local 的 UBO，通过 cmd_update_buffer 写入
    #[inline]
    pub fn new_ubo_device(gfx: &Gfx, len: usize, debug_name: impl AsRef<str>) -> RenderResult<Self> {
        Self::new(
            gfx,
            debug_name,
            len,
            vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            false,
        )
    }

    /// device local 的 storage buffer，通过 cmd_update_buffer 写入
    #[inline]
    pub fn new_storage_device(gfx: &Gfx, len: usize, debug_name: impl AsRef<str>) -> RenderResult<Self> {
        Self::new(
            gfx,
            debug_name,
            len,
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            false,
        )
    }

    #[inline]
    pub fn new(
        gfx: &Gfx,
        debug_name: impl AsRef<str>,
        len: usize,
        buffer_usage_flags: vk::BufferUsageFlags,
        mapped: bool,
    ) -> RenderResult<Self> {
        let allocation_create_flags = if mapped {
            vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
        } else {
            vk_mem::AllocationCreateFlags::empty()
        };

        Ok(Self {
            inner: GfxBuffer::new(
                gfx,
                Rc::new(GfxBufferCreateInfo::new((len * size_of::<T>()) as vk::DeviceSize, buffer_usage_flags)),
                Rc::new(vk_mem::AllocationCreateInfo {
                    usage: vk_mem::MemoryUsage::AutoPreferDevice,
                    flags: allocation_create_flags,
                    ..Default::default()
                }),
                Some(gfx.device.min_ubo_offset_align()),
                debug_name,
            )?,
            len,
            _phantom: PhantomData,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 写入第 index 个元素，要求 buffer 是 mapped 的
    pub fn write(&mut self, index: usize, value: &T) -> RenderResult<()> {
        debug_assert!(index < self.len);
        let Some(mapped_ptr) = self.inner.map_ptr else {
            return Err(crate::error::RenderError::Unsupported("buffer is not mapped"));
        };
        unsafe {
            let ptr = (mapped_ptr as *mut T).add(index);
            ptr.write(*value);
        }
        self.inner.flush(
            (index * size_of::<T>()) as vk::DeviceSize,
            size_of::<T>() as vk::DeviceSize,
        )?;
        Ok(())
    }
}

/// 顶点类型是 u32
pub struct GfxIndexBuffer {
    inner: GfxBuffer,

    /// 索引数量
    index_cnt: usize,
}
impl_deref_buffer!(GfxIndexBuffer, GfxBuffer, inner);
impl GfxIndexBuffer {
    pub fn new(gfx: &Gfx, data: &[u32], debug_name: impl AsRef<str>) -> RenderResult<Self> {
        let size = size_of_val(data);
        let mut buffer = GfxBuffer::new_index_buffer(gfx, size, debug_name)?;
        buffer.transfer_data_sync(gfx, data)?;

        Ok(Self {
            inner: buffer,
            index_cnt: data.len(),
        })
    }

    #[inline]
    pub fn index_type() -> vk::IndexType {
        vk::IndexType::UINT32
    }

    #[inline]
    pub fn index_cnt(&self) -> usize {
        self.index_cnt
    }
}

pub struct GfxVertexBuffer<V: bytemuck::Pod> {
    inner: GfxBuffer,

    /// 顶点数量
    vertex_cnt: usize,

    _phantom: PhantomData<V>,
}
impl<V: bytemuck::Pod> Deref for GfxVertexBuffer<V> {
    type Target = GfxBuffer;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
impl<V: bytemuck::Pod> DerefMut for GfxVertexBuffer<V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
impl<V: bytemuck::Pod> GfxVertexBuffer<V> {
    pub fn new(gfx: &Gfx, data: &[V], debug_name: impl AsRef<str>) -> RenderResult<Self> {
        let size = size_of_val(data);
        let mut buffer = GfxBuffer::new_vertex_buffer(gfx, size, debug_name)?;
        buffer.transfer_data_sync(gfx, data)?;

        Ok(Self {
            inner: buffer,
            vertex_cnt: data.len(),
            _phantom: PhantomData,
        })
    }

    #[inline]
    pub fn vertex_cnt(&self) -> usize {
        self.vertex_cnt
    }
}
