//! Member-list subscription (op 14) and `GUILD_MEMBER_LIST_UPDATE` payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::message::User;

/// Requested windows per channel id, each window an inclusive `[start, end]`.
pub type ChannelRanges = BTreeMap<String, Vec<[u32; 2]>>;

/// Body of an op 14 frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberListSubscription {
	pub guild_id: String,
	pub typing: bool,
	pub threads: bool,
	pub activities: bool,
	pub members: Vec<String>,
	pub channels: ChannelRanges,
}

impl MemberListSubscription {
	pub fn new(guild_id: impl Into<String>, channel_id: impl Into<String>, windows: Vec<[u32; 2]>) -> Self {
		let mut channels = ChannelRanges::new();
		channels.insert(channel_id.into(), windows);
		Self {
			guild_id: guild_id.into(),
			typing: true,
			threads: true,
			activities: true,
			members: Vec::new(),
			channels,
		}
	}
}

/// A guild member as it appears inside member-list items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildMember {
	pub user: User,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nick: Option<String>,
	#[serde(default)]
	pub roles: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub joined_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub presence: Option<serde_json::Value>,
}

/// Group header inside the list (role or online/offline section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListGroup {
	pub id: String,
	#[serde(default)]
	pub count: u64,
}

/// One row of the member list: either a group header or a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListItem {
	Member { member: GuildMember },
	Group { group: ListGroup },
}

impl ListItem {
	pub fn member(&self) -> Option<&GuildMember> {
		match self {
			ListItem::Member { member } => Some(member),
			ListItem::Group { .. } => None,
		}
	}
}

/// Operation applied to the member list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "UPPERCASE")]
pub enum MemberListOp {
	/// Full contents of one requested window.
	Sync {
		range: [u32; 2],
		#[serde(default)]
		items: Vec<ListItem>,
	},
	Insert {
		index: u32,
		item: ListItem,
	},
	Update {
		index: u32,
		item: ListItem,
	},
	Delete {
		index: u32,
	},
	/// The window is no longer tracked by the server.
	Invalidate {
		range: [u32; 2],
	},
	#[serde(other)]
	Unknown,
}

/// Payload of `GUILD_MEMBER_LIST_UPDATE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildMemberListUpdate {
	pub guild_id: String,
	/// List id (`"everyone"` or a permission hash).
	#[serde(default)]
	pub id: String,
	/// Server-reported total; zero when unknown.
	#[serde(default)]
	pub member_count: u64,
	#[serde(default)]
	pub online_count: u64,
	#[serde(default)]
	pub groups: Vec<ListGroup>,
	#[serde(default)]
	pub ops: Vec<MemberListOp>,
}
