use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 评分阶段结束时的进度值
pub const SCORING_PROGRESS_CEILING: u8 = 80;
/// 运行完成时的进度值
pub const COMPLETE_PROGRESS: u8 = 100;

/// 进度回调，接收 `[0, 100]` 的整数百分比
pub trait ProgressSink: Send {
    fn report(&mut self, percent: u8);
}

impl<F> ProgressSink for F
where
    F: FnMut(u8) + Send,
{
    fn report(&mut self, percent: u8) {
        self(percent)
    }
}

/// 不关心进度时使用
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _percent: u8) {}
}

/// 第 `completed` 个评分样本完成后的进度：`floor(completed / total * 80)`
///
/// 用整数运算，只有全部样本完成时才会等于 80。
pub fn scoring_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return SCORING_PROGRESS_CEILING;
    }
    let completed = completed.min(total);
    (completed * usize::from(SCORING_PROGRESS_CEILING) / total) as u8
}

/// 保证上报的进度单调不减、不超过 100
pub(crate) struct ProgressReporter<'a> {
    sink: &'a mut dyn ProgressSink,
    last: Option<u8>,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self { sink, last: None }
    }

    pub(crate) fn report(&mut self, percent: u8) {
        let percent = percent.min(COMPLETE_PROGRESS);
        let percent = self.last.map_or(percent, |last| percent.max(last));
        self.last = Some(percent);
        self.sink.report(percent);
    }
}

/// 协作式取消标记，可克隆后交给其他任务
///
/// 流水线在每次解码前检查一次。
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_progress_reaches_ceiling_only_at_end() {
        let total = 5 * 24;
        for completed in 1..total {
            assert!(scoring_progress(completed, total) < SCORING_PROGRESS_CEILING);
        }
        assert_eq!(scoring_progress(total, total), SCORING_PROGRESS_CEILING);
        assert_eq!(scoring_progress(3, total), 2);
        assert_eq!(scoring_progress(60, total), 40);
    }

    #[test]
    fn test_reporter_is_monotonic() {
        let mut seen = Vec::new();
        {
            let mut sink = |p: u8| seen.push(p);
            let mut reporter = ProgressReporter::new(&mut sink);
            reporter.report(10);
            reporter.report(5);
            reporter.report(120);
        }
        assert_eq!(seen, vec![10, 10, 100]);
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
