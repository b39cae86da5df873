// ==========================================
// 货代后台系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value)
// 说明: 配置值非法时回退默认值并告警,不阻断业务
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    // 集装箱看板分页
    pub const CONTAINERS_DEFAULT_PAGE_SIZE: &str = "containers.default_page_size";
    pub const CONTAINERS_MAX_PAGE_SIZE: &str = "containers.max_page_size";

    // 活动流
    pub const ACTIVITY_DEFAULT_LIMIT: &str = "activity.default_limit";

    // 导入
    pub const IMPORT_DEFAULT_ORIGIN: &str = "import.default_origin";
}

// ==========================================
// 默认值
// ==========================================
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 200;
pub const DEFAULT_ACTIVITY_LIMIT: u32 = 50;
pub const DEFAULT_ORIGIN: &str = "CHINA";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入配置值（UPSERT）
    pub fn set_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;

        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 读取并解析配置,缺失或非法时回退默认值
    fn get_parsed_or<T: FromStr + Copy>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>> {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(config_key = key, raw_value = %raw, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 集装箱看板 =====

    /// 调用方未指定 limit 时使用的每页条数
    pub fn get_default_page_size(&self) -> Result<u32, Box<dyn Error>> {
        let v = self.get_parsed_or(config_keys::CONTAINERS_DEFAULT_PAGE_SIZE, DEFAULT_PAGE_SIZE)?;
        Ok(if v == 0 { DEFAULT_PAGE_SIZE } else { v })
    }

    /// limit 上限
    pub fn get_max_page_size(&self) -> Result<u32, Box<dyn Error>> {
        let v = self.get_parsed_or(config_keys::CONTAINERS_MAX_PAGE_SIZE, DEFAULT_MAX_PAGE_SIZE)?;
        Ok(if v == 0 { DEFAULT_MAX_PAGE_SIZE } else { v })
    }

    // ===== 活动流 =====

    pub fn get_activity_default_limit(&self) -> Result<u32, Box<dyn Error>> {
        let v = self.get_parsed_or(config_keys::ACTIVITY_DEFAULT_LIMIT, DEFAULT_ACTIVITY_LIMIT)?;
        Ok(if v == 0 { DEFAULT_ACTIVITY_LIMIT } else { v })
    }

    // ===== 导入 =====

    pub fn get_default_origin(&self) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_config_value(config_keys::IMPORT_DEFAULT_ORIGIN)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ORIGIN.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = crate::db::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_missing() {
        let config = manager();
        assert_eq!(config.get_default_page_size().unwrap(), DEFAULT_PAGE_SIZE);
        assert_eq!(config.get_max_page_size().unwrap(), DEFAULT_MAX_PAGE_SIZE);
        assert_eq!(config.get_activity_default_limit().unwrap(), DEFAULT_ACTIVITY_LIMIT);
        assert_eq!(config.get_default_origin().unwrap(), "CHINA");
    }

    #[test]
    fn test_set_and_override() {
        let config = manager();
        config.set_value(config_keys::CONTAINERS_DEFAULT_PAGE_SIZE, "50").unwrap();
        config.set_value(config_keys::IMPORT_DEFAULT_ORIGIN, "VIETNAM").unwrap();
        assert_eq!(config.get_default_page_size().unwrap(), 50);
        assert_eq!(config.get_default_origin().unwrap(), "VIETNAM");

        let snapshot = config.get_config_snapshot().unwrap();
        assert!(snapshot.contains("VIETNAM"));
    }

    #[test]
    fn test_invalid_value_falls_back() {
        let config = manager();
        config.set_value(config_keys::ACTIVITY_DEFAULT_LIMIT, "lots").unwrap();
        assert_eq!(config.get_activity_default_limit().unwrap(), DEFAULT_ACTIVITY_LIMIT);
    }
}
