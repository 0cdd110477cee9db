use baseseva_shared::{AppNotification, NotificationKind};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows::{parse_enum, parse_json, parse_ts, parse_uuid, ts};

const NOTIFICATION_COLUMNS: &str = "id, user_address, kind, title, message, data, is_read, created_at";

impl Database {
    pub fn insert_notification(&self, notification: &AppNotification) -> Result<()> {
        let data = serde_json::to_string(&notification.data)?;
        self.conn().execute(
            &format!(
                "INSERT INTO notifications ({NOTIFICATION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                notification.id.to_string(),
                notification.user_address,
                notification.kind.as_str(),
                notification.title,
                notification.message,
                data,
                notification.read,
                ts(&notification.created_at),
            ],
        )?;
        Ok(())
    }

    /// Notifications for a user, newest first.
    pub fn list_notifications(
        &self,
        user_address: &str,
        unread_only: bool,
    ) -> Result<Vec<AppNotification>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_address = ?1 AND (?2 = 0 OR is_read = 0)
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![user_address, unread_only], row_to_notification)?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    /// Flag a notification as read and return it. Marking twice is harmless.
    pub fn mark_notification_read(&self, id: Uuid) -> Result<AppNotification> {
        let affected = self.conn().execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        let notification = self.conn().query_row(
            &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
            params![id.to_string()],
            row_to_notification,
        )?;
        Ok(notification)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppNotification> {
    let id_str: String = row.get(0)?;
    let kind: String = row.get(2)?;
    let data: String = row.get(5)?;
    let created_str: String = row.get(7)?;

    Ok(AppNotification {
        id: parse_uuid(0, &id_str)?,
        user_address: row.get(1)?,
        kind: parse_enum::<NotificationKind>(2, &kind)?,
        title: row.get(3)?,
        message: row.get(4)?,
        data: parse_json(5, &data)?,
        read: row.get(6)?,
        created_at: parse_ts(7, &created_str)?,
    })
}
