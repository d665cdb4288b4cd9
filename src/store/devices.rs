use std::collections::HashSet;

use chrono::Utc;

use super::Store;
use crate::error::HubError;
use crate::model::{Device, DeviceSettings, DeviceSettingsPatch};
use crate::types::AssetClass;

impl Store {
    /// Idempotent upsert that preserves existing name/type when the caller
    /// omits them and always advances `last_seen`. On first insert, also
    /// initializes the device's settings row to defaults.
    pub async fn register_device(
        &self,
        device_id: &str,
        name: Option<&str>,
        device_type: Option<&str>,
    ) -> Result<(), HubError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let existing: Option<(Option<String>, Option<String>)> =
            sqlx::query_as("SELECT device_name, device_type FROM devices WHERE device_id = ?")
                .bind(device_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (final_name, final_type) = match existing {
            Some((existing_name, existing_type)) => (
                name.map(str::to_string).or(existing_name),
                device_type.map(str::to_string).or(existing_type),
            ),
            None => (name.map(str::to_string), device_type.map(str::to_string)),
        };

        sqlx::query(
            "INSERT INTO devices (device_id, device_name, device_type, first_seen, last_seen, enabled)
             VALUES (?, ?, ?, ?, ?, 1)
             ON CONFLICT(device_id) DO UPDATE SET
                 device_name = excluded.device_name,
                 device_type = excluded.device_type,
                 last_seen = excluded.last_seen",
        )
        .bind(device_id)
        .bind(&final_name)
        .bind(&final_type)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let defaults = DeviceSettings::defaults(now);
        sqlx::query(
            "INSERT OR IGNORE INTO device_settings
             (device_id, scroll_mode, scroll_speed, brightness, update_interval,
              top_sources, bottom_sources, dwell_seconds, asset_order, font, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(device_id)
        .bind(defaults.scroll_mode.to_string())
        .bind(defaults.scroll_speed)
        .bind(defaults.brightness)
        .bind(defaults.update_interval)
        .bind(serde_json::to_string(&defaults.top_sources).unwrap())
        .bind(serde_json::to_string(&defaults.bottom_sources).unwrap())
        .bind(defaults.dwell_seconds)
        .bind(serde_json::to_string(&defaults.asset_order).unwrap())
        .bind(&defaults.font)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>, HubError> {
        let rows: Vec<(String, Option<String>, Option<String>, chrono::DateTime<Utc>, chrono::DateTime<Utc>, bool)> =
            sqlx::query_as(
                "SELECT device_id, device_name, device_type, first_seen, last_seen, enabled
                 FROM devices ORDER BY last_seen DESC",
            )
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(device_id, device_name, device_type, first_seen, last_seen, enabled)| Device {
                device_id,
                device_name,
                device_type,
                first_seen,
                last_seen,
                enabled,
            })
            .collect())
    }

    /// Returns settings for `device_id`, registering the device with defaults
    /// first if it is unknown.
    pub async fn get_device_settings(&self, device_id: &str) -> Result<DeviceSettings, HubError> {
        let row: Option<(String, i64, i64, i64, String, String, f64, String, String, chrono::DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT scroll_mode, scroll_speed, brightness, update_interval,
                        top_sources, bottom_sources, dwell_seconds, asset_order, font, updated_at
                 FROM device_settings WHERE device_id = ?",
            )
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            Ok(row_to_settings(row))
        } else {
            self.register_device(device_id, None, None).await?;
            let row: (String, i64, i64, i64, String, String, f64, String, String, chrono::DateTime<Utc>) =
                sqlx::query_as(
                    "SELECT scroll_mode, scroll_speed, brightness, update_interval,
                            top_sources, bottom_sources, dwell_seconds, asset_order, font, updated_at
                     FROM device_settings WHERE device_id = ?",
                )
                .bind(device_id)
                .fetch_one(&self.pool)
                .await?;
            Ok(row_to_settings(row))
        }
    }

    /// Partial update; every successful call advances `updated_at`, even if
    /// no field in the patch actually changed a value (spec §3).
    pub async fn put_device_settings(
        &self,
        device_id: &str,
        patch: &DeviceSettingsPatch,
    ) -> Result<DeviceSettings, HubError> {
        // Ensure the device (and a default settings row) exists.
        let _ = self.get_device_settings(device_id).await?;

        let now = Utc::now();
        let mut set_clauses = Vec::new();
        let mut bind_strings: Vec<String> = Vec::new();
        let mut bind_ints: Vec<(usize, i64)> = Vec::new();
        let mut bind_floats: Vec<(usize, f64)> = Vec::new();

        // Build the SQL dynamically but keep binds typed, matching the
        // original's dynamic UPDATE builder.
        let mut idx = 0usize;
        macro_rules! push_string {
            ($col:literal, $val:expr) => {{
                set_clauses.push(concat!($col, " = ?"));
                bind_strings.push($val);
                idx += 1;
            }};
        }
        macro_rules! push_int {
            ($col:literal, $val:expr) => {{
                set_clauses.push(concat!($col, " = ?"));
                bind_ints.push((idx, $val));
                idx += 1;
            }};
        }
        macro_rules! push_float {
            ($col:literal, $val:expr) => {{
                set_clauses.push(concat!($col, " = ?"));
                bind_floats.push((idx, $val));
                idx += 1;
            }};
        }

        if let Some(mode) = &patch.scroll_mode {
            push_string!("scroll_mode", mode.clone());
        }
        if let Some(v) = patch.scroll_speed {
            push_int!("scroll_speed", v);
        }
        if let Some(v) = patch.brightness {
            push_int!("brightness", v);
        }
        if let Some(v) = patch.update_interval {
            push_int!("update_interval", v);
        }
        if let Some(v) = &patch.top_sources {
            push_string!("top_sources", serde_json::to_string(v).unwrap());
        }
        if let Some(v) = &patch.bottom_sources {
            push_string!("bottom_sources", serde_json::to_string(v).unwrap());
        }
        if let Some(v) = patch.dwell_seconds {
            push_float!("dwell_seconds", v);
        }
        if let Some(v) = &patch.asset_order {
            push_string!("asset_order", serde_json::to_string(v).unwrap());
        }
        if let Some(v) = &patch.font {
            push_string!("font", v.clone());
        }

        set_clauses.push("updated_at = ?");

        let sql = format!(
            "UPDATE device_settings SET {} WHERE device_id = ?",
            set_clauses.join(", ")
        );
        let mut query = sqlx::query(&sql);
        // Binds must be applied in the same order the placeholders appear.
        // We rebuild the ordered bind sequence from the three typed buffers.
        let mut s_iter = bind_strings.into_iter();
        let mut i_iter = bind_ints.into_iter().peekable();
        let mut f_iter = bind_floats.into_iter().peekable();
        for pos in 0..idx {
            if i_iter.peek().map(|(p, _)| *p) == Some(pos) {
                query = query.bind(i_iter.next().unwrap().1);
            } else if f_iter.peek().map(|(p, _)| *p) == Some(pos) {
                query = query.bind(f_iter.next().unwrap().1);
            } else {
                query = query.bind(s_iter.next().unwrap());
            }
        }
        query = query.bind(now).bind(device_id);
        query.execute(&self.pool).await?;

        self.get_device_settings(device_id).await
    }

    /// Advances `updated_at` without modifying any field.
    pub async fn touch_device_settings(&self, device_id: &str) -> Result<(), HubError> {
        let _ = self.get_device_settings(device_id).await?;
        sqlx::query("UPDATE device_settings SET updated_at = ? WHERE device_id = ?")
            .bind(Utc::now())
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[allow(clippy::type_complexity)]
fn row_to_settings(
    row: (String, i64, i64, i64, String, String, f64, String, String, chrono::DateTime<Utc>),
) -> DeviceSettings {
    let (scroll_mode, scroll_speed, brightness, update_interval, top_sources, bottom_sources, dwell_seconds, asset_order, font, updated_at) = row;

    DeviceSettings {
        scroll_mode: scroll_mode.parse().unwrap_or_default(),
        scroll_speed,
        brightness,
        update_interval,
        top_sources: serde_json::from_str::<HashSet<AssetClass>>(&top_sources).unwrap_or_default(),
        bottom_sources: serde_json::from_str::<HashSet<AssetClass>>(&bottom_sources).unwrap_or_default(),
        dwell_seconds,
        asset_order: serde_json::from_str::<Vec<AssetClass>>(&asset_order)
            .unwrap_or_else(|_| vec![AssetClass::Stocks, AssetClass::Crypto, AssetClass::Forex]),
        font,
        updated_at,
    }
}

#[cfg(test)]
mod tests {
    use crate::model::DeviceSettingsPatch;
    use crate::store::test_support::test_store;

    #[tokio::test]
    async fn auto_registers_device_on_first_settings_fetch() {
        let store = test_store().await;
        let settings = store.get_device_settings("NEW").await.unwrap();
        assert_eq!(settings.scroll_speed, 100);

        let devices = store.list_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_id, "NEW");
        assert_eq!(devices[0].first_seen, devices[0].last_seen);
    }

    #[tokio::test]
    async fn settings_watermark_strictly_increases() {
        let store = test_store().await;
        let before = store.get_device_settings("DEV-1").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let patch = DeviceSettingsPatch {
            brightness: Some(8),
            ..Default::default()
        };
        let after = store.put_device_settings("DEV-1", &patch).await.unwrap();

        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.brightness, 8);
    }

    #[tokio::test]
    async fn touch_advances_watermark_without_changing_fields() {
        let store = test_store().await;
        let before = store.get_device_settings("DEV-1").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.touch_device_settings("DEV-1").await.unwrap();
        let after = store.get_device_settings("DEV-1").await.unwrap();
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.brightness, before.brightness);
        assert_eq!(after.scroll_speed, before.scroll_speed);
    }

    #[tokio::test]
    async fn register_device_preserves_name_when_omitted() {
        let store = test_store().await;
        store.register_device("DEV-2", Some("Kitchen"), Some("scroller")).await.unwrap();
        store.register_device("DEV-2", None, None).await.unwrap();
        let devices = store.list_devices().await.unwrap();
        let dev = devices.iter().find(|d| d.device_id == "DEV-2").unwrap();
        assert_eq!(dev.device_name.as_deref(), Some("Kitchen"));
        assert_eq!(dev.device_type.as_deref(), Some("scroller"));
    }
}
