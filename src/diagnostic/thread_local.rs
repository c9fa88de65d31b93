// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;

thread_local! {
    static CONTEXT_MAP: RefCell<BTreeMap<String, String>> = const { RefCell::new(BTreeMap::new()) };
    static CONTEXT_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Thread-scoped diagnostic state.
///
/// Two shapes are kept per thread: a key-value map and a nested frame stack.
/// Both are snapshotted into every record the thread emits. Map entries shadow
/// repository properties of the same name; per-record properties shadow both.
///
/// # Examples
///
/// ```
/// use logtree::diagnostic::ThreadContext;
///
/// ThreadContext::put("request", "r-42");
/// {
///     let _scope = ThreadContext::push("handler");
///     // records emitted here carry the "handler" frame
/// }
/// ThreadContext::remove("request");
/// ```
#[derive(Debug, Default, Clone, Copy)]
#[non_exhaustive]
pub struct ThreadContext {}

impl ThreadContext {
    /// Insert a key-value pair into the current thread's context map.
    pub fn put<K, V>(key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        CONTEXT_MAP.with(|map| {
            map.borrow_mut().insert(key.into(), value.into());
        });
    }

    /// Remove a key-value pair from the current thread's context map.
    pub fn remove(key: &str) {
        CONTEXT_MAP.with(|map| {
            map.borrow_mut().remove(key);
        });
    }

    /// Look up a value in the current thread's context map.
    pub fn get(key: &str) -> Option<String> {
        CONTEXT_MAP.with(|map| map.borrow().get(key).cloned())
    }

    /// Clear the current thread's context map.
    pub fn clear() {
        CONTEXT_MAP.with(|map| map.borrow_mut().clear());
    }

    /// Push a frame onto the current thread's context stack.
    ///
    /// The returned guard pops the frame when dropped, on every exit path.
    #[must_use = "the frame is popped when the returned scope is dropped"]
    pub fn push(frame: impl Into<String>) -> ContextScope {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(frame.into()));
        ContextScope {
            _not_send: PhantomData,
        }
    }

    /// The current depth of the context stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    pub(crate) fn snapshot_map() -> Vec<(String, String)> {
        CONTEXT_MAP.with(|map| {
            map.borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    pub(crate) fn snapshot_stack() -> Vec<String> {
        CONTEXT_STACK.with(|stack| stack.borrow().clone())
    }
}

/// Pops one context frame when dropped.
#[derive(Debug)]
pub struct ContextScope {
    // scopes belong to the thread that pushed them
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_put_get_remove() {
        ThreadContext::put("user", "alice");
        assert_eq!(ThreadContext::get("user"), Some("alice".to_string()));
        ThreadContext::remove("user");
        assert_eq!(ThreadContext::get("user"), None);
    }

    #[test]
    fn test_scope_pops_on_drop() {
        assert_eq!(ThreadContext::depth(), 0);
        {
            let _outer = ThreadContext::push("outer");
            assert_eq!(ThreadContext::depth(), 1);
            {
                let _inner = ThreadContext::push("inner");
                assert_eq!(ThreadContext::snapshot_stack(), vec!["outer", "inner"]);
            }
            assert_eq!(ThreadContext::depth(), 1);
        }
        assert_eq!(ThreadContext::depth(), 0);
    }

    #[test]
    fn test_scope_pops_on_early_return() {
        fn inner() -> Result<(), ()> {
            let _scope = ThreadContext::push("short-lived");
            Err(())
        }
        let _ = inner();
        assert_eq!(ThreadContext::depth(), 0);
    }
}
