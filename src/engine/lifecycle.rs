// ==========================================
// 货代后台系统 - 状态生命周期管理
// ==========================================
// 职责: 状态词表校验 + 迁移策略
// 现行策略: 不设迁移图,任意状态可到达任意状态(含回退与原地)
// ==========================================

use crate::domain::types::StatusVocabulary;
use crate::engine::error::{EngineError, EngineResult};

/// 迁移策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// 任意迁移均允许
    #[default]
    Unrestricted,
    /// 仅允许沿词表顺序前进或原地（备用,未启用）
    ForwardOnly,
}

/// 状态管理器
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleManager {
    policy: TransitionPolicy,
}

impl LifecycleManager {
    pub fn new(policy: TransitionPolicy) -> Self {
        Self { policy }
    }

    /// 解析外部传入的状态字符串
    ///
    /// # 错误
    /// - 不在词表内时返回 Validation,消息列出全部合法值
    pub fn parse_status<S: StatusVocabulary>(&self, raw: &str) -> EngineResult<S> {
        S::parse(raw).ok_or_else(|| {
            let allowed: Vec<&str> = S::ALL.iter().map(|s| s.as_str()).collect();
            EngineError::Validation(format!(
                "无效的{}状态: {} (允许: {})",
                S::VOCABULARY,
                raw.trim(),
                allowed.join(", ")
            ))
        })
    }

    /// 校验一次迁移
    pub fn check_transition<S: StatusVocabulary>(&self, from: S, to: S) -> EngineResult<()> {
        match self.policy {
            TransitionPolicy::Unrestricted => Ok(()),
            TransitionPolicy::ForwardOnly => {
                let pos = |s: S| S::ALL.iter().position(|x| *x == s);
                if pos(to) >= pos(from) {
                    Ok(())
                } else {
                    Err(EngineError::InvalidTransition {
                        from: from.to_string(),
                        to: to.to_string(),
                    })
                }
            }
        }
    }
}
