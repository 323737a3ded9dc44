//! # 滚动驱动器
//!
//! 反复执行“采集、滚动、等待、检查增长”的循环，直到页面不再增长：
//!
//! ```text
//! Idle → Scrolling → CheckingForGrowth → Scrolling | WaitingForLoad | Done
//!                    WaitingForLoad → CheckingForGrowth
//! ```
//!
//! 驱动器只依赖 `PageHost`（DOM、度量、滚动）和 `Clock`（等待），
//! 所以可以用回放宿主或脚本化宿主驱动。

pub mod host;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::CollectorConfig;
use crate::error::{HarvestError, HarvestResult};
use crate::extract::{count_items, extract_page, Extractor, PageContext, Profile};
use crate::parsers::html::Selector;
use crate::store::{RecordStore, StorageBackend};

pub use host::{Clock, PageHost, PageMetrics, ReplayHost, ThreadClock};

/// 驱动器参数
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// 每次滚动的像素数
    pub scroll_step: u32,
    /// 滚动后等待内容加载的时间
    pub scroll_delay: Duration,
    /// 加载指示器出现时的复查间隔
    pub load_check_delay: Duration,
    /// 加载指示器持续存在时的最大复查次数
    pub max_retries: u32,
    /// 距页面底部多少像素视为到底
    pub bottom_margin: u64,
    /// 连续多少次到底且无增长后结束
    pub bottom_confirmations: u32,
    pub container_selector: Option<Selector>,
    pub loading_selector: Option<Selector>,
    /// 滚动周期上限，无人值守时使用
    pub max_cycles: Option<u32>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            scroll_step: 1000,
            scroll_delay: Duration::from_millis(3000),
            load_check_delay: Duration::from_millis(1000),
            max_retries: 8,
            bottom_margin: 500,
            bottom_confirmations: 2,
            container_selector: None,
            loading_selector: None,
            max_cycles: None,
        }
    }
}

impl DriverConfig {
    /// 由全局配置和站点规则集组合
    pub fn from_config(config: &CollectorConfig, profile: &Profile) -> Self {
        DriverConfig {
            scroll_step: config.scroll_step,
            scroll_delay: Duration::from_millis(config.scroll_delay_ms),
            load_check_delay: Duration::from_millis(config.load_check_delay_ms),
            max_retries: config.max_retries,
            bottom_margin: config.bottom_margin,
            bottom_confirmations: config.bottom_confirmations.max(1),
            container_selector: profile.container.clone(),
            loading_selector: profile.loading.clone(),
            max_cycles: config.max_cycles,
        }
    }
}

/// 结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 页面到底且不再增长
    Exhausted,
    /// 收到停止请求
    Stopped,
    /// 遇到早于截止日期的记录
    CutoffReached,
    /// 找不到滚动容器
    ContainerMissing,
    /// 达到滚动周期上限
    CycleLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            StopReason::Exhausted => "已到达页面底部",
            StopReason::Stopped => "已手动停止",
            StopReason::CutoffReached => "已到达截止日期",
            StopReason::ContainerMissing => "未找到滚动容器",
            StopReason::CycleLimit => "已达到滚动次数上限",
        };
        f.write_str(text)
    }
}

/// 驱动器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Scrolling,
    CheckingForGrowth,
    WaitingForLoad,
    Done(StopReason),
}

impl DriverState {
    pub fn is_done(&self) -> bool {
        matches!(self, DriverState::Done(_))
    }
}

/// 一次运行的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u32,
    pub checks: u32,
    pub added: usize,
    pub evicted: usize,
    pub skipped: usize,
    pub load_timeouts: u32,
    pub persistence_failures: u32,
    pub reason: Option<StopReason>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Snapshot {
    height: u64,
    count: usize,
}

/// 滚动驱动器
pub struct ScrollDriver<E, B, H, C> {
    config: DriverConfig,
    extractor: E,
    store: RecordStore<B>,
    host: H,
    clock: C,
    fallback_url: Option<Url>,
    state: DriverState,
    snapshot: Snapshot,
    retries: u32,
    bottom_strikes: u32,
    stop: Arc<AtomicBool>,
    summary: RunSummary,
}

impl<E, B, H, C> ScrollDriver<E, B, H, C>
where
    E: Extractor,
    B: StorageBackend,
    H: PageHost,
    C: Clock,
{
    pub fn new(
        config: DriverConfig,
        extractor: E,
        store: RecordStore<B>,
        host: H,
        clock: C,
    ) -> Self {
        ScrollDriver {
            config,
            extractor,
            store,
            host,
            clock,
            fallback_url: None,
            state: DriverState::Idle,
            snapshot: Snapshot::default(),
            retries: 0,
            bottom_strikes: 0,
            stop: Arc::new(AtomicBool::new(false)),
            summary: RunSummary::default(),
        }
    }

    /// 宿主未提供页面地址时用于解析相对链接
    pub fn with_fallback_url(mut self, url: Option<Url>) -> Self {
        self.fallback_url = url;
        self
    }

    /// 停止标志，可在其他线程中设置
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn store(&self) -> &RecordStore<B> {
        &self.store
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn into_store(self) -> RecordStore<B> {
        self.store
    }

    /// 执行一次状态转换
    pub fn step(&mut self) -> HarvestResult<DriverState> {
        if self.state.is_done() {
            return Ok(self.state);
        }
        if self.stop.load(Ordering::SeqCst) {
            info!("采集已停止");
            return Ok(self.finish(StopReason::Stopped));
        }

        let next = match self.state {
            DriverState::Idle => self.begin()?,
            DriverState::Scrolling => self.scroll_cycle()?,
            DriverState::CheckingForGrowth => self.check_for_growth()?,
            DriverState::WaitingForLoad => {
                self.clock.pause(self.config.load_check_delay);
                DriverState::CheckingForGrowth
            }
            DriverState::Done(reason) => DriverState::Done(reason),
        };

        if let DriverState::Done(reason) = next {
            return Ok(self.finish(reason));
        }
        self.state = next;
        Ok(next)
    }

    /// 运行到结束
    ///
    /// 已结束的驱动器会从 `Idle` 重新开始；停止标志不会被清除。
    /// `&mut self` 保证同一驱动器不会同时运行两次。
    pub fn run(&mut self) -> HarvestResult<RunSummary> {
        if self.state.is_done() {
            self.state = DriverState::Idle;
            self.summary = RunSummary::default();
        }

        info!("开始采集: {}", self.extractor.name());
        self.drive()?;

        info!(
            "采集结束（{}），新增 {} 条，当前共 {} 条",
            self.summary
                .reason
                .map(|r| r.to_string())
                .unwrap_or_default(),
            self.summary.added,
            self.store.len()
        );
        Ok(self.summary.clone())
    }

    fn drive(&mut self) -> HarvestResult<()> {
        while !self.step()?.is_done() {}
        Ok(())
    }

    fn finish(&mut self, reason: StopReason) -> DriverState {
        self.summary.reason = Some(reason);
        self.state = DriverState::Done(reason);
        self.state
    }

    fn begin(&mut self) -> HarvestResult<DriverState> {
        self.retries = 0;
        self.bottom_strikes = 0;
        let (metrics, count) = self.observe()?;
        self.snapshot = Snapshot {
            height: metrics.container_height.unwrap_or(0),
            count,
        };
        debug!(
            "初始高度 {}，列表项 {}",
            self.snapshot.height, self.snapshot.count
        );

        if self.collect()? {
            return Ok(DriverState::Done(StopReason::CutoffReached));
        }
        Ok(DriverState::Scrolling)
    }

    fn scroll_cycle(&mut self) -> HarvestResult<DriverState> {
        if let Some(limit) = self.config.max_cycles {
            if self.summary.cycles >= limit {
                warn!("已达到滚动次数上限 {}", limit);
                return Ok(DriverState::Done(StopReason::CycleLimit));
            }
        }

        if self.collect()? {
            return Ok(DriverState::Done(StopReason::CutoffReached));
        }

        self.host.scroll_by(self.config.scroll_step)?;
        self.summary.cycles += 1;
        debug!("第 {} 次滚动", self.summary.cycles);
        self.clock.pause(self.config.scroll_delay);
        Ok(DriverState::CheckingForGrowth)
    }

    fn check_for_growth(&mut self) -> HarvestResult<DriverState> {
        self.summary.checks += 1;
        let (metrics, count) = self.observe()?;

        let Some(height) = metrics.container_height else {
            error!("未找到滚动容器");
            return Ok(DriverState::Done(StopReason::ContainerMissing));
        };

        if height > self.snapshot.height || count > self.snapshot.count {
            debug!(
                "页面增长: 高度 {} → {}，列表项 {} → {}",
                self.snapshot.height, height, self.snapshot.count, count
            );
            self.snapshot = Snapshot { height, count };
            self.retries = 0;
            self.bottom_strikes = 0;
            return Ok(DriverState::Scrolling);
        }

        if self.is_loading()? {
            self.retries += 1;
            if self.retries > self.config.max_retries {
                let timeout = HarvestError::LoadTimeout {
                    retries: self.config.max_retries,
                };
                warn!("{}，强制继续滚动", timeout);
                self.summary.load_timeouts += 1;
                self.retries = 0;
                // 指示器一直不消失时，到底的检查仍然计入确认次数
                return Ok(self.bottom_check(&metrics));
            }
            debug!(
                "正在加载，第 {}/{} 次等待",
                self.retries, self.config.max_retries
            );
            return Ok(DriverState::WaitingForLoad);
        }

        Ok(self.bottom_check(&metrics))
    }

    fn bottom_check(&mut self, metrics: &PageMetrics) -> DriverState {
        if !metrics.is_at_bottom(self.config.bottom_margin) {
            self.bottom_strikes = 0;
            return DriverState::Scrolling;
        }

        self.bottom_strikes += 1;
        debug!(
            "已到底部，第 {}/{} 次确认",
            self.bottom_strikes, self.config.bottom_confirmations
        );
        if self.bottom_strikes >= self.config.bottom_confirmations {
            DriverState::Done(StopReason::Exhausted)
        } else {
            DriverState::Scrolling
        }
    }

    fn observe(&mut self) -> HarvestResult<(PageMetrics, usize)> {
        let metrics = self
            .host
            .metrics(self.config.container_selector.as_ref())?;
        let dom = self.host.document()?;
        let count = count_items(&self.extractor, &dom);
        Ok((metrics, count))
    }

    fn is_loading(&mut self) -> HarvestResult<bool> {
        let Some(selector) = &self.config.loading_selector else {
            return Ok(false);
        };
        let dom = self.host.document()?;
        Ok(selector.select_first(dom.root_element()).is_some())
    }

    /// 采集当前页面，返回是否到达截止条件
    fn collect(&mut self) -> HarvestResult<bool> {
        let dom = self.host.document()?;
        let base_url = self.host.base_url().or_else(|| self.fallback_url.clone());
        let page = PageContext::new(&dom, base_url);
        let extraction = extract_page(&self.extractor, &page)?;
        self.summary.skipped += extraction.skipped;

        match self.store.insert(extraction.records) {
            Ok(report) => {
                self.summary.added += report.added;
                self.summary.evicted += report.evicted;
            }
            Err(e) => {
                error!("保存数据失败: {}", e);
                self.summary.persistence_failures += 1;
            }
        }

        Ok(extraction.reached_cutoff)
    }
}
