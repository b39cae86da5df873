// ==========================================
// 货代后台系统 - 数值宽松解析与舍入
// ==========================================
// 红线: 所有 "解析失败按 0 处理" 只走这里,便于审计
// 舍入: CBM 3 位小数, 重量/金额 2 位小数, 只在输出时舍入
// ==========================================

use crate::domain::shipment::FieldValue;

/// 宽松解析浮点数
///
/// - 数字原样返回（NaN/无穷按 0）
/// - 字符串去首尾空白与千分位逗号后解析,失败按 0
/// - 缺失按 0
pub fn lenient_f64(value: Option<&FieldValue>) -> f64 {
    let parsed = match value {
        None => 0.0,
        Some(FieldValue::Number(n)) => *n,
        Some(FieldValue::Text(s)) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                0.0
            } else {
                cleaned.parse::<f64>().unwrap_or_else(|_| {
                    tracing::debug!(raw = %s, "数值解析失败,按 0 处理");
                    0.0
                })
            }
        }
    };

    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

/// 箱数/件数的绝对值上限; 两者之积仍在 i64 范围内
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// 宽松解析整数
///
/// "10" → 10, "10.9" → 10 (截断), "abc" → 0
/// 绝对值超过 MAX_QUANTITY 视同解析失败,按 0
pub fn lenient_i64(value: Option<&FieldValue>) -> i64 {
    if let Some(FieldValue::Text(s)) = value {
        let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
        if let Ok(n) = cleaned.parse::<i64>() {
            return within_quantity_limit(n as f64);
        }
    }
    within_quantity_limit(lenient_f64(value).trunc())
}

fn within_quantity_limit(value: f64) -> i64 {
    if value.abs() > MAX_QUANTITY as f64 {
        tracing::debug!(value, "数量超出上限,按 0 处理");
        0
    } else {
        value as i64
    }
}

fn round_to(value: f64, scale: f64) -> f64 {
    let rounded = (value * scale).round() / scale;
    // 避免输出 -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// CBM 舍入（3 位小数）
pub fn round3(value: f64) -> f64 {
    round_to(value, 1_000.0)
}

/// 重量/金额舍入（2 位小数）
pub fn round2(value: f64) -> f64 {
    round_to(value, 100.0)
}
