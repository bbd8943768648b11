use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::params;

use chatline_shared::{
    ChatId, Message, MessageId, ProtocolInfo, QuotedMessage, Reaction, UserId,
};

use crate::database::Database;
use crate::error::Result;

const MESSAGE_COLUMNS: &str = "id, chat_id, sender, sender_name, content, timestamp, from_me,
     has_media, media_path, edited, deleted, quoted_id, quoted_sender, quoted_content,
     protocol_code, protocol_name";

impl Database {
    /// Insert or update a message together with its reaction list.
    ///
    /// An existing row keeps its rowid, so arrival order survives updates.
    pub fn upsert_message(&self, message: &Message) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;

        tx.execute(
            "INSERT INTO messages (id, chat_id, sender, sender_name, content, timestamp, from_me,
                                   has_media, media_path, edited, deleted, quoted_id,
                                   quoted_sender, quoted_content, protocol_code, protocol_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(id) DO UPDATE SET
                chat_id = excluded.chat_id,
                sender = excluded.sender,
                sender_name = excluded.sender_name,
                content = excluded.content,
                timestamp = excluded.timestamp,
                from_me = excluded.from_me,
                has_media = excluded.has_media,
                media_path = excluded.media_path,
                edited = excluded.edited,
                deleted = excluded.deleted,
                quoted_id = excluded.quoted_id,
                quoted_sender = excluded.quoted_sender,
                quoted_content = excluded.quoted_content,
                protocol_code = excluded.protocol_code,
                protocol_name = excluded.protocol_name",
            params![
                message.id.as_str(),
                message.chat_id.as_str(),
                message.sender.as_str(),
                message.sender_name,
                message.content,
                message.timestamp.to_rfc3339(),
                message.from_me as i32,
                message.has_media as i32,
                message.media_path,
                message.edited as i32,
                message.deleted as i32,
                message.quoted.as_ref().map(|q| q.id.as_str()),
                message
                    .quoted
                    .as_ref()
                    .and_then(|q| q.sender.as_ref())
                    .map(|s| s.as_str()),
                message.quoted.as_ref().map(|q| q.content.as_str()),
                message.protocol.as_ref().map(|p| p.code),
                message.protocol.as_ref().map(|p| p.name.as_str()),
            ],
        )?;

        tx.execute(
            "DELETE FROM reactions WHERE message_id = ?1",
            params![message.id.as_str()],
        )?;
        for (position, reaction) in message.reactions.iter().enumerate() {
            tx.execute(
                "INSERT INTO reactions (message_id, sender, sender_name, emoji, timestamp, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.id.as_str(),
                    reaction.sender.as_str(),
                    reaction.sender_name,
                    reaction.emoji,
                    reaction.timestamp.to_rfc3339(),
                    position as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Every stored message in arrival order, reactions attached.
    pub fn load_messages(&self) -> Result<Vec<Message>> {
        let mut reactions = self.load_all_reactions()?;

        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY rowid ASC");
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            let mut message = row?;
            if let Some(list) = reactions.remove(&message.id) {
                message.reactions = list;
            }
            messages.push(message);
        }
        Ok(messages)
    }

    fn load_all_reactions(&self) -> Result<HashMap<MessageId, Vec<Reaction>>> {
        let mut stmt = self.conn().prepare(
            "SELECT message_id, sender, sender_name, emoji, timestamp
             FROM reactions ORDER BY message_id, position ASC",
        )?;

        let rows = stmt.query_map([], row_to_reaction)?;

        let mut map: HashMap<MessageId, Vec<Reaction>> = HashMap::new();
        for row in rows {
            let (message_id, reaction) = row?;
            map.entry(message_id).or_default().push(reaction);
        }
        Ok(map)
    }
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let ts_str: String = row.get(5)?;
    let timestamp = parse_timestamp(5, &ts_str)?;

    let quoted_id: Option<String> = row.get(11)?;
    let quoted_sender: Option<String> = row.get(12)?;
    let quoted_content: Option<String> = row.get(13)?;
    let quoted = quoted_id.map(|id| QuotedMessage {
        id: MessageId(id),
        sender: quoted_sender.map(UserId),
        content: quoted_content.unwrap_or_default(),
    });

    let protocol_code: Option<i32> = row.get(14)?;
    let protocol_name: Option<String> = row.get(15)?;
    let protocol = protocol_code.map(|code| ProtocolInfo {
        code,
        name: protocol_name.unwrap_or_default(),
    });

    Ok(Message {
        id: MessageId(row.get(0)?),
        chat_id: ChatId(row.get(1)?),
        sender: UserId(row.get(2)?),
        sender_name: row.get(3)?,
        content: row.get(4)?,
        timestamp,
        from_me: row.get::<_, i32>(6)? != 0,
        has_media: row.get::<_, i32>(7)? != 0,
        media_path: row.get(8)?,
        edited: row.get::<_, i32>(9)? != 0,
        deleted: row.get::<_, i32>(10)? != 0,
        quoted,
        protocol,
        reactions: Vec::new(),
    })
}

fn row_to_reaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<(MessageId, Reaction)> {
    let ts_str: String = row.get(4)?;
    let timestamp = parse_timestamp(4, &ts_str)?;

    Ok((
        MessageId(row.get(0)?),
        Reaction {
            sender: UserId(row.get(1)?),
            sender_name: row.get(2)?,
            emoji: row.get(3)?,
            timestamp,
        },
    ))
}
