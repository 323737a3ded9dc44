//! 页面宿主
//!
//! 宿主是外部协作者：提供 DOM 快照、布局度量和滚动原语。
//! `ReplayHost` 用一组已保存的页面帧模拟懒加载列表。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::{HarvestError, HarvestResult};
use crate::parsers::html::{html_to_dom, Html, Selector};

/// 一次检查时的布局度量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageMetrics {
    /// 滚动容器高度，容器不存在时为 `None`
    pub container_height: Option<u64>,
    pub scroll_y: u64,
    pub viewport_height: u64,
    pub document_height: u64,
}

impl PageMetrics {
    /// 视口底部是否已进入页面底部 `margin` 像素范围内
    pub fn is_at_bottom(&self, margin: u64) -> bool {
        self.viewport_height + self.scroll_y >= self.document_height.saturating_sub(margin)
    }
}

/// 宿主环境接口
pub trait PageHost {
    /// 当前页面的 DOM 快照
    fn document(&mut self) -> HarvestResult<Html>;

    /// 当前布局度量；`container` 为空时以文档高度作为容器高度
    fn metrics(&mut self, container: Option<&Selector>) -> HarvestResult<PageMetrics>;

    /// 向下滚动 `step` 像素
    fn scroll_by(&mut self, step: u32) -> HarvestResult<()>;

    /// 页面地址
    fn base_url(&self) -> Option<Url> {
        None
    }
}

/// 等待原语
pub trait Clock {
    fn pause(&mut self, duration: Duration);
}

/// 使用线程休眠的时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadClock;

impl Clock for ThreadClock {
    fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// 回放已保存帧的宿主
///
/// 帧按文件名排序，每一帧代表懒加载之后的一次页面状态。
/// 视口滚动到底部附近且还有后续帧时，载入下一帧。
pub struct ReplayHost {
    frames: Vec<PathBuf>,
    current: usize,
    scroll_y: u64,
    viewport_height: u64,
    item_height: u64,
    chrome_height: u64,
    bottom_margin: u64,
    item_selector: Selector,
    container: Option<Selector>,
    encoding: String,
    base_url: Option<Url>,
}

impl ReplayHost {
    pub const DEFAULT_VIEWPORT_HEIGHT: u64 = 900;
    pub const DEFAULT_ITEM_HEIGHT: u64 = 300;
    pub const DEFAULT_CHROME_HEIGHT: u64 = 400;

    /// 从目录中读取 `.html`/`.htm` 帧
    pub fn from_dir(
        dir: &Path,
        item_selector: Selector,
        container: Option<Selector>,
    ) -> HarvestResult<Self> {
        let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && matches!(
                        path.extension().and_then(|ext| ext.to_str()),
                        Some("html") | Some("htm")
                    )
            })
            .collect();
        frames.sort();
        Self::from_frames(frames, item_selector, container)
    }

    pub fn from_frames(
        frames: Vec<PathBuf>,
        item_selector: Selector,
        container: Option<Selector>,
    ) -> HarvestResult<Self> {
        if frames.is_empty() {
            return Err(HarvestError::Host("没有可回放的页面帧".to_string()));
        }
        debug!("回放 {} 个页面帧", frames.len());

        Ok(ReplayHost {
            frames,
            current: 0,
            scroll_y: 0,
            viewport_height: Self::DEFAULT_VIEWPORT_HEIGHT,
            item_height: Self::DEFAULT_ITEM_HEIGHT,
            chrome_height: Self::DEFAULT_CHROME_HEIGHT,
            bottom_margin: 500,
            item_selector,
            container,
            encoding: "utf-8".to_string(),
            base_url: None,
        })
    }

    pub fn viewport_height(mut self, height: u64) -> Self {
        self.viewport_height = height;
        self
    }

    pub fn item_height(mut self, height: u64) -> Self {
        self.item_height = height;
        self
    }

    pub fn bottom_margin(mut self, margin: u64) -> Self {
        self.bottom_margin = margin;
        self
    }

    pub fn encoding(mut self, encoding: &str) -> Self {
        self.encoding = encoding.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: Option<Url>) -> Self {
        self.base_url = base_url;
        self
    }

    /// 当前帧序号（从 0 开始）
    pub fn frame_index(&self) -> usize {
        self.current
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn load_frame(&self) -> HarvestResult<Html> {
        let path = &self.frames[self.current];
        let data = fs::read(path)
            .map_err(|e| HarvestError::Host(format!("无法读取帧 {}: {}", path.display(), e)))?;
        Ok(html_to_dom(&data, &self.encoding))
    }

    fn measure(&self, container: Option<&Selector>) -> HarvestResult<PageMetrics> {
        let dom = self.load_frame()?;
        let root = dom.root_element();
        let container_height = match container {
            Some(selector) => selector
                .select_first(root)
                .map(|node| self.item_selector.select(node).len() as u64 * self.item_height),
            None => Some(self.item_selector.select(root).len() as u64 * self.item_height),
        };
        let document_height = container_height.unwrap_or(0) + self.chrome_height;

        Ok(PageMetrics {
            container_height,
            scroll_y: self.scroll_y,
            viewport_height: self.viewport_height,
            document_height,
        })
    }
}

impl PageHost for ReplayHost {
    fn document(&mut self) -> HarvestResult<Html> {
        self.load_frame()
    }

    fn metrics(&mut self, container: Option<&Selector>) -> HarvestResult<PageMetrics> {
        self.measure(container)
    }

    fn scroll_by(&mut self, step: u32) -> HarvestResult<()> {
        let container = self.container.clone();
        let before = self.measure(container.as_ref())?;
        let max_scroll = before.document_height.saturating_sub(self.viewport_height);
        self.scroll_y = (self.scroll_y + step as u64).min(max_scroll);

        let after = PageMetrics {
            scroll_y: self.scroll_y,
            ..before
        };
        if after.is_at_bottom(self.bottom_margin) && self.current + 1 < self.frames.len() {
            self.current += 1;
            debug!("载入第 {} 帧", self.current + 1);
        }
        Ok(())
    }

    fn base_url(&self) -> Option<Url> {
        self.base_url.clone()
    }
}
