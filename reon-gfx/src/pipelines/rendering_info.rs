use ash::vk;

/// dynamic rendering 所需的 attachment 描述
///
/// 相比直接使用 vk::RenderingInfo，这里把 attachment 的构造集中起来，
/// pass 只需要给出 view 和 load/store 策略
pub struct GfxRenderingInfo {
    color_attach_info: Vec<vk::RenderingAttachmentInfo<'static>>,
    depth_attach_info: Option<vk::RenderingAttachmentInfo<'static>>,
    range: vk::Rect2D,
}
impl GfxRenderingInfo {
    pub fn new(range: vk::Rect2D) -> Self {
        Self {
            color_attach_info: vec![],
            depth_attach_info: None,
            range,
        }
    }

    /// builder：clear + store 的 color attachment
    pub fn color_attach(mut self, image_view: vk::ImageView, clear_color: [f32; 4]) -> Self {
        self.color_attach_info.push(
            vk::RenderingAttachmentInfo::default()
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .image_view(image_view)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue { float32: clear_color },
                }),
        );
        self
    }

    /// builder：load + store 的 color attachment，保留之前 pass 的内容
    pub fn color_attach_load(mut self, image_view: vk::ImageView) -> Self {
        self.color_attach_info.push(
            vk::RenderingAttachmentInfo::default()
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .image_view(image_view)
                .load_op(vk::AttachmentLoadOp::LOAD)
                .store_op(vk::AttachmentStoreOp::STORE),
        );
        self
    }

    /// builder：MSAA color attachment，渲染结束时 resolve 到单采样的 resolve_view
    pub fn color_attach_resolve(
        mut self,
        msaa_view: vk::ImageView,
        resolve_view: vk::ImageView,
        clear_color: [f32; 4],
    ) -> Self {
        self.color_attach_info.push(
            vk::RenderingAttachmentInfo::default()
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .image_view(msaa_view)
                .resolve_mode(vk::ResolveModeFlags::AVERAGE)
                .resolve_image_view(resolve_view)
                .resolve_image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue { float32: clear_color },
                }),
        );
        self
    }

    /// builder：clear 的 depth attachment，1.0 表示无限远
    pub fn depth_attach(mut self, depth_view: vk::ImageView, store_op: vk::AttachmentStoreOp) -> Self {
        self.depth_attach_info = Some(
            vk::RenderingAttachmentInfo::default()
                .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                .image_view(depth_view)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(store_op)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: 1_f32, stencil: 0 },
                }),
        );
        self
    }

    /// builder：load 之前 pass 写入的 depth attachment，transparent pass 只读 depth
    pub fn depth_attach_load(mut self, depth_view: vk::ImageView, store_op: vk::AttachmentStoreOp) -> Self {
        self.depth_attach_info = Some(
            vk::RenderingAttachmentInfo::default()
                .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                .image_view(depth_view)
                .load_op(vk::AttachmentLoadOp::LOAD)
                .store_op(store_op),
        );
        self
    }

    pub fn rendering_info(&self) -> vk::RenderingInfo {
        let mut info = vk::RenderingInfo::default()
            .layer_count(1)
            .render_area(self.range)
            .color_attachments(&self.color_attach_info);
        if let Some(depth_attach) = &self.depth_attach_info {
            info = info.depth_attachment(depth_attach)
        }
        info
    }
}
