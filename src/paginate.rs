//! Cursor-loop pagination driver
//!
//! Turns any paged RPC (a closure fetching one page per cursor) into either
//! a gather-all call ([`fetch_all`]) or a lazy stream ([`page_stream`]).
//!
//! The cursor is opaque: the driver only checks for presence. An absent or
//! empty `nextCursor` terminates the loop. Streams produced by
//! [`page_stream`] are finite and not restartable; each invocation of the
//! factory issues fresh first-page requests. Consumers wanting caching must
//! materialize with [`fetch_all`].

use std::collections::VecDeque;
use std::future::Future;

use futures::Stream;

use crate::error::Result;

/// One page of results: the items plus the cursor for the next page.
pub type Page<T> = (Vec<T>, Option<String>);

/// Gather every page into one `Vec`, following `nextCursor` until the server
/// stops returning one.
///
/// The first call receives `None`; each later call receives the previous
/// page's cursor. Failure on any page aborts the loop and surfaces the
/// error; already-fetched items are discarded.
///
/// # Examples
///
/// ```
/// use mcpkit::paginate::fetch_all;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let all = fetch_all(|cursor| async move {
///     Ok(match cursor.as_deref() {
///         None => (vec![1, 2], Some("p2".to_string())),
///         Some("p2") => (vec![3], None),
///         Some(other) => panic!("unexpected cursor {other}"),
///     })
/// })
/// .await?;
/// assert_eq!(all, vec![1, 2, 3]);
/// # Ok(())
/// # }
/// ```
pub async fn fetch_all<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let (page, next_cursor) = fetch_page(cursor.take()).await?;
        items.extend(page);

        match next_cursor {
            Some(c) if !c.is_empty() => cursor = Some(c),
            _ => break,
        }
    }

    Ok(items)
}

/// Internal unfold state for [`page_stream`].
struct PageState<T, F> {
    fetch_page: F,
    cursor: Option<String>,
    buffer: VecDeque<T>,
    done: bool,
}

/// Lazily yield every item across all pages, fetching each page on demand.
///
/// Yields items in page order, then item order within each page, the same
/// sequence [`fetch_all`] returns. A page failure yields one `Err` and ends
/// the stream. Dropping the stream cancels the in-flight page request along
/// with it.
///
/// # Examples
///
/// ```
/// use futures::StreamExt;
/// use mcpkit::paginate::page_stream;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let stream = page_stream(|cursor| async move {
///     Ok(match cursor.as_deref() {
///         None => (vec![1, 2], Some("p2".to_string())),
///         Some(_) => (vec![3], None),
///     })
/// });
/// let items: Vec<i32> = stream.map(|r| r.unwrap()).collect().await;
/// assert_eq!(items, vec![1, 2, 3]);
/// # Ok(())
/// # }
/// ```
pub fn page_stream<T, F, Fut>(fetch_page: F) -> impl Stream<Item = Result<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let state = PageState {
        fetch_page,
        cursor: None,
        buffer: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.buffer.pop_front() {
                return Some((Ok(item), state));
            }
            if state.done {
                return None;
            }

            match (state.fetch_page)(state.cursor.take()).await {
                Err(e) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                Ok((items, next_cursor)) => {
                    match next_cursor {
                        Some(c) if !c.is_empty() => state.cursor = Some(c),
                        _ => state.done = true,
                    }
                    state.buffer = items.into();
                }
            }
        }
    })
}
