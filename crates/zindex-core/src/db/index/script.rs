//! Module: index::script
//! Responsibility: the atomic store-side procedures used by query execution,
//! as Lua source for script-capable stores and as shared helpers for
//! in-process stores.
//!
//! Both scripts take `KEYS[1] = source`, `KEYS[2] = destination` and
//! `ARGV[1], ARGV[2] = min, max` in the store's range syntax.

use crate::INDEX_SEPARATOR;

/// Extract record ids from a string index range into a rank-scored set.
///
/// Members are validated before the first write so a malformed member leaves
/// the destination untouched. `.*%z` is greedy, so the id is taken after the
/// last NUL.
pub const EXTRACT_IDS_LUA: &str = r"
local members = redis.call('ZRANGEBYLEX', KEYS[1], ARGV[1], ARGV[2])
if #members == 0 then
  return 0
end
local ids = {}
for i, member in ipairs(members) do
  local id = string.match(member, '^.*%z(.*)$')
  if id == nil then
    return redis.error_reply('member without separator in ' .. KEYS[1])
  end
  ids[i] = id
end
for i, id in ipairs(ids) do
  redis.call('ZADD', KEYS[2], i, id)
end
return #ids
";

/// Copy a score range, scores included, into another sorted set.
pub const COPY_SCORE_RANGE_LUA: &str = r"
local entries = redis.call('ZRANGEBYSCORE', KEYS[1], ARGV[1], ARGV[2], 'WITHSCORES')
for i = 1, #entries, 2 do
  redis.call('ZADD', KEYS[2], entries[i + 1], entries[i])
end
return #entries / 2
";

///
/// ScriptKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScriptKind {
    ExtractIds,
    CopyScoreRange,
}

/// Record id stored after the last separator of a string index member.
///
/// Returns `None` when the member carries no separator.
#[must_use]
pub fn id_from_member(member: &[u8]) -> Option<&[u8]> {
    let position = member.iter().rposition(|byte| *byte == INDEX_SEPARATOR)?;

    Some(&member[position + 1..])
}

/// Score given to the extracted id at zero-based scan position `position`.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn rank_score(position: usize) -> f64 {
    (position + 1) as f64
}

///
/// TESTS
///
