use std::collections::HashSet;

use cordwire_protocol::GuildMember;

/// Members keyed by user id, in arrival order. First write wins and the set
/// never grows past its capacity.
#[derive(Debug)]
pub struct RecordSet {
	members: Vec<GuildMember>,
	seen: HashSet<String>,
	capacity: usize,
}

impl RecordSet {
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			members: Vec::new(),
			seen: HashSet::new(),
			capacity,
		}
	}

	/// Inserts `member` unless its id is known or the set is full.
	pub fn insert(&mut self, member: &GuildMember) -> bool {
		if self.is_full() || self.seen.contains(&member.user.id) {
			return false;
		}
		self.seen.insert(member.user.id.clone());
		self.members.push(member.clone());
		true
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}

	pub fn is_full(&self) -> bool {
		self.members.len() >= self.capacity
	}

	pub fn into_members(self) -> Vec<GuildMember> {
		self.members
	}
}
