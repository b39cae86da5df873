// ==========================================
// 货代后台系统 - 装柜明细规范化
// ==========================================
// 输入: 上传层/表单给出的 ShipmentRow
// 输出: 可直接写库的 ItemDraft (t 字段已重算)
// 红线: t 字段只由 ctn × 单件值 得出,忽略调用方传入的合计
// ==========================================

use crate::domain::shipment::{ItemDraft, ShipmentRow};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::numeric::{lenient_f64, lenient_i64, round2, round3};

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 规范化单行
///
/// # 参数
/// - `row_no`: 从 1 开始的行号（错误提示用）
/// - `default_ctn_mark`: 行内未给箱唛时使用（通常是客户唛头）
pub fn normalize_row(
    row: &ShipmentRow,
    row_no: usize,
    default_ctn_mark: &str,
) -> EngineResult<ItemDraft> {
    let particular = row.particular.trim();
    if particular.is_empty() {
        return Err(EngineError::Validation(format!(
            "第{}行: particular 不能为空",
            row_no
        )));
    }

    // 负箱数按 0 处理,与解析失败一致
    let ctn = lenient_i64(row.ctn.as_ref()).max(0);
    let pcs = lenient_i64(row.pcs.as_ref());
    let cbm = lenient_f64(row.cbm.as_ref());
    let wt = lenient_f64(row.wt.as_ref());
    let tpcs = ctn.checked_mul(pcs).ok_or_else(|| {
        EngineError::Validation(format!("第{}行: 件数合计超出范围", row_no))
    })?;

    Ok(ItemDraft {
        particular: particular.to_string(),
        item_no: non_blank(&row.item_no),
        ctn_mark: non_blank(&row.ctn_mark).unwrap_or_else(|| default_ctn_mark.trim().to_string()),
        ctn,
        pcs,
        tpcs,
        cbm,
        tcbm: round3(ctn as f64 * cbm),
        wt,
        twt: round2(ctn as f64 * wt),
        unit: non_blank(&row.unit),
        photo: non_blank(&row.photo),
    })
}

/// 规范化整批行
///
/// # 错误
/// - rows 为空
/// - 任一行 particular 为空（整批拒绝）
pub fn normalize_rows(rows: &[ShipmentRow], default_ctn_mark: &str) -> EngineResult<Vec<ItemDraft>> {
    if rows.is_empty() {
        return Err(EngineError::Validation("rows 不能为空".to_string()));
    }

    rows.iter()
        .enumerate()
        .map(|(idx, row)| normalize_row(row, idx + 1, default_ctn_mark))
        .collect()
}

/// 为未给箱唛的明细补上默认箱唛
///
/// 用于锁外先规范化、锁内才知道客户唛头的场景
pub fn fill_default_ctn_mark(drafts: &mut [ItemDraft], default_ctn_mark: &str) {
    let fallback = default_ctn_mark.trim();
    for draft in drafts.iter_mut().filter(|d| d.ctn_mark.is_empty()) {
        draft.ctn_mark = fallback.to_string();
    }
}

/// 校验必填文本参数（去首尾空白后非空）
pub fn require_text<'a>(field: &str, value: &'a str) -> EngineResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{} 不能为空", field)));
    }
    Ok(trimmed)
}
