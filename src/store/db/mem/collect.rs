use std::{cmp::Ordering, collections::BTreeMap, fmt, sync::RwLock};

use serde_json::{Map, Value as JsonValue};
use tracing::trace;

use crate::{
    ChatflowError, Result,
    store::{DbCollection, PageData, Query, query},
};

use super::DbDocument;

/// One in-memory collection, ordered by id.
pub struct Collect<T> {
    name: String,
    items: RwLock<BTreeMap<String, T>>,
}

impl<T> fmt::Debug for Collect<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Collect").field("name", &self.name).finish()
    }
}

impl<T> Collect<T>
where
    T: DbDocument + Clone,
{
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: RwLock::new(BTreeMap::new()),
        }
    }

    fn lock_err(&self) -> ChatflowError {
        ChatflowError::Store(format!("collection {} lock poisoned", self.name))
    }

    /// Whether another record than `id` already holds `key`.
    fn key_taken(
        items: &BTreeMap<String, T>,
        id: &str,
        key: &Option<String>,
    ) -> bool {
        match key {
            Some(key) => items.values().any(|item| item.id() != id && item.unique_key().as_ref() == Some(key)),
            None => false,
        }
    }

    fn unique_violation(
        &self,
        data: &T,
    ) -> ChatflowError {
        ChatflowError::Store(format!("duplicate key in {}: {}", self.name, data.unique_key().unwrap_or_default()))
    }
}

impl<T> DbCollection for Collect<T>
where
    T: DbDocument + Clone + Send + Sync,
{
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        let items = self.items.read().map_err(|_| self.lock_err())?;
        Ok(items.contains_key(id))
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Option<Self::Item>> {
        trace!("{}::find({})", self.name, id);
        let items = self.items.read().map_err(|_| self.lock_err())?;
        Ok(items.get(id).cloned())
    }

    fn query(
        &self,
        q: &Query,
    ) -> Result<PageData<Self::Item>> {
        trace!("{}::query({:?})", self.name, q);
        let items = self.items.read().map_err(|_| self.lock_err())?;

        let mut matched: Vec<(Map<String, JsonValue>, &T)> = Vec::new();
        for item in items.values() {
            let doc = item.doc()?;
            if q.matches(&doc) {
                matched.push((doc, item));
            }
        }

        if !q.order_by().is_empty() {
            matched.sort_by(|(a, _), (b, _)| {
                for (key, rev) in q.order_by() {
                    let null = JsonValue::Null;
                    let ord = query::compare(a.get(key).unwrap_or(&null), b.get(key).unwrap_or(&null)).unwrap_or(Ordering::Equal);
                    let ord = if *rev {
                        ord.reverse()
                    } else {
                        ord
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let count = matched.len();
        let rows = matched.into_iter().skip(q.offset()).take(q.limit()).map(|(_, item)| item.clone()).collect();
        Ok(PageData {
            count,
            page_num: q.offset() / q.limit() + 1,
            page_count: count.div_ceil(q.limit()),
            page_size: q.limit(),
            rows,
        })
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("{}::create({})", self.name, data.id());
        let mut items = self.items.write().map_err(|_| self.lock_err())?;
        if items.contains_key(data.id()) || Self::key_taken(&items, data.id(), &data.unique_key()) {
            return Ok(false);
        }
        items.insert(data.id().to_string(), data.clone());
        Ok(true)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("{}::update({})", self.name, data.id());
        let mut items = self.items.write().map_err(|_| self.lock_err())?;
        if !items.contains_key(data.id()) {
            return Ok(false);
        }
        if Self::key_taken(&items, data.id(), &data.unique_key()) {
            return Err(self.unique_violation(data));
        }
        items.insert(data.id().to_string(), data.clone());
        Ok(true)
    }

    fn upsert(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("{}::upsert({})", self.name, data.id());
        let mut items = self.items.write().map_err(|_| self.lock_err())?;
        if Self::key_taken(&items, data.id(), &data.unique_key()) {
            return Err(self.unique_violation(data));
        }
        items.insert(data.id().to_string(), data.clone());
        Ok(true)
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("{}::delete({})", self.name, id);
        let mut items = self.items.write().map_err(|_| self.lock_err())?;
        Ok(items.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::{
        DbCollection, Query,
        data::{Session, SessionStatus, Tag},
    };

    use super::Collect;

    fn tag(
        id: &str,
        name: &str,
    ) -> Tag {
        Tag {
            id: id.into(),
            workspace_id: "w1".into(),
            name: name.into(),
            create_time: 0,
        }
    }

    #[test]
    fn test_create_reports_duplicates() {
        let tags = Collect::<Tag>::new("tags");
        assert!(tags.create(&tag("t1", "vip")).unwrap());
        assert!(!tags.create(&tag("t1", "other")).unwrap());
        assert!(!tags.create(&tag("t2", "vip")).unwrap());
        assert_eq!(tags.query(&Query::new()).unwrap().count, 1);
    }

    #[test]
    fn test_single_waiting_session_per_contact_channel() {
        let sessions = Collect::<Session>::new("sessions");
        let waiting = |id: &str| Session {
            id: id.into(),
            contact_id: "c1".into(),
            channel_id: "ch1".into(),
            waiting_for_input: true,
            ..Default::default()
        };
        assert!(sessions.create(&waiting("s1")).unwrap());
        assert!(!sessions.create(&waiting("s2")).unwrap());

        let mut done = waiting("s1");
        done.status = SessionStatus::Completed;
        assert!(sessions.update(&done).unwrap());
        assert!(sessions.create(&waiting("s2")).unwrap());

        let mut again = waiting("s1");
        again.status = SessionStatus::Active;
        assert!(sessions.update(&again).is_err());
    }

    #[test]
    fn test_query_sort_and_page() {
        let tags = Collect::<Tag>::new("tags");
        for (id, name) in [("a", "z"), ("b", "y"), ("c", "x")] {
            tags.create(&tag(id, name)).unwrap();
        }
        let page = tags.query(&Query::new().sort("name", false).with_limit(2)).unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.page_count, 2);
        assert_eq!(page.rows.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["c", "b"]);

        let page = tags.query(&Query::new().sort("name", false).with_limit(2).with_offset(2)).unwrap();
        assert_eq!(page.page_num, 2);
        assert_eq!(page.rows[0].id, "a");
    }
}
