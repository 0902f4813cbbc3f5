use super::{LedgerCategory, LedgerCursor, LedgerEvent, LedgerReader, UserId};
use anyhow::Result;

/// Pull iterator over a user's ledger.
///
/// Each `next()` fetches one page with the cursor returned by the previous
/// fetch. Iteration ends after the page that comes back without a cursor, or
/// right after the first error.
pub struct LedgerPages<'a> {
    reader: &'a dyn LedgerReader,
    user_id: UserId,
    categories: &'a [LedgerCategory],
    page_size: usize,
    cursor: Option<LedgerCursor>,
    exhausted: bool,
}

impl<'a> LedgerPages<'a> {
    pub fn new(
        reader: &'a dyn LedgerReader,
        user_id: UserId,
        categories: &'a [LedgerCategory],
        page_size: usize,
    ) -> Self {
        Self {
            reader,
            user_id,
            categories,
            page_size,
            cursor: None,
            exhausted: false,
        }
    }
}

impl Iterator for LedgerPages<'_> {
    type Item = Result<Vec<LedgerEvent>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        match self.reader.fetch_page(
            self.user_id,
            self.cursor.as_ref(),
            self.categories,
            self.page_size,
        ) {
            Ok(page) => {
                self.exhausted = page.next_cursor.is_none();
                self.cursor = page.next_cursor;
                Some(Ok(page.events))
            }
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet_store::LedgerPage;
    use std::sync::Mutex;

    /// Serves pre-built pages; the cursor is the index of the next page.
    struct ScriptedReader {
        pages: Vec<Result<Vec<i64>, String>>,
        seen_cursors: Mutex<Vec<Option<String>>>,
    }

    impl LedgerReader for ScriptedReader {
        fn fetch_page(
            &self,
            user_id: UserId,
            cursor: Option<&LedgerCursor>,
            _categories: &[LedgerCategory],
            _limit: usize,
        ) -> Result<LedgerPage> {
            self.seen_cursors
                .lock()
                .unwrap()
                .push(cursor.map(|c| c.0.clone()));
            let index: usize = cursor.map(|c| c.0.parse().unwrap()).unwrap_or(0);
            let ids = self.pages[index].clone().map_err(anyhow::Error::msg)?;
            let next_cursor =
                (index + 1 < self.pages.len()).then(|| LedgerCursor((index + 1).to_string()));
            Ok(LedgerPage {
                events: ids
                    .into_iter()
                    .map(|id| LedgerEvent {
                        id,
                        user_id,
                        created_at: id,
                        category: LedgerCategory::Stacked,
                        amount_msats: 1000,
                        fee_msats: 0,
                        confirmation: None,
                    })
                    .collect(),
                next_cursor,
            })
        }
    }

    fn ids(page: Result<Vec<LedgerEvent>>) -> Vec<i64> {
        page.unwrap().into_iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_walks_pages_with_previous_cursor() {
        let reader = ScriptedReader {
            pages: vec![Ok(vec![3, 2]), Ok(vec![1])],
            seen_cursors: Mutex::new(vec![]),
        };
        let mut pages = LedgerPages::new(&reader, 7, &LedgerCategory::ALL, 2);

        assert_eq!(ids(pages.next().unwrap()), vec![3, 2]);
        assert_eq!(ids(pages.next().unwrap()), vec![1]);
        assert!(pages.next().is_none());

        let seen = reader.seen_cursors.lock().unwrap().clone();
        assert_eq!(seen, vec![None, Some("1".to_string())]);
    }

    #[test]
    fn test_single_empty_page_ends_iteration() {
        let reader = ScriptedReader {
            pages: vec![Ok(vec![])],
            seen_cursors: Mutex::new(vec![]),
        };
        let mut pages = LedgerPages::new(&reader, 7, &LedgerCategory::ALL, 10);

        assert!(ids(pages.next().unwrap()).is_empty());
        assert!(pages.next().is_none());
    }

    #[test]
    fn test_stops_after_error() {
        let reader = ScriptedReader {
            pages: vec![Ok(vec![2]), Err("boom".to_string()), Ok(vec![1])],
            seen_cursors: Mutex::new(vec![]),
        };
        let mut pages = LedgerPages::new(&reader, 7, &LedgerCategory::ALL, 1);

        assert_eq!(ids(pages.next().unwrap()), vec![2]);
        assert!(pages.next().unwrap().is_err());
        assert!(pages.next().is_none());
        assert_eq!(reader.seen_cursors.lock().unwrap().len(), 2);
    }
}
