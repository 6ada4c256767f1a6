//! In-memory storage
//!
//! Process-local implementation of the storage traits, used for local
//! development (`DATABASE_URL=memory://`) and by the test suite. Contents are
//! lost on restart.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

use crate::database::models::{Book, User};
use crate::database::store::{BookStore, CreateUserError, UserStore};

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    books: BTreeMap<i64, Book>,
    last_user_id: i64,
    last_book_id: i64,
}

/// Storage kept behind a single lock so each call is atomic
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> std::result::Result<User, CreateUserError> {
        let mut state = self.state.lock();
        if state.users.contains_key(username) {
            return Err(CreateUserError::UsernameTaken);
        }

        state.last_user_id += 1;
        let user = User {
            id: state.last_user_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        state.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.state.lock().users.get(username).cloned())
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn insert_book(&self, owner: i64, title: &str, author: &str) -> Result<Book> {
        let mut state = self.state.lock();
        state.last_book_id += 1;
        let book = Book {
            id: state.last_book_id,
            title: title.to_string(),
            author: author.to_string(),
            read: false,
            user_id: owner,
        };
        state.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn list_books(&self, owner: i64) -> Result<Vec<Book>> {
        let state = self.state.lock();
        Ok(state
            .books
            .values()
            .filter(|book| book.user_id == owner)
            .cloned()
            .collect())
    }

    async fn get_book(&self, owner: i64, id: i64) -> Result<Option<Book>> {
        let state = self.state.lock();
        Ok(state.books.get(&id).filter(|book| book.user_id == owner).cloned())
    }

    async fn update_book(
        &self,
        owner: i64,
        id: i64,
        title: &str,
        author: &str,
    ) -> Result<Option<Book>> {
        let mut state = self.state.lock();
        Ok(owned_mut(&mut state, owner, id).map(|book| {
            book.title = title.to_string();
            book.author = author.to_string();
            book.clone()
        }))
    }

    async fn set_book_read(&self, owner: i64, id: i64, read: bool) -> Result<Option<Book>> {
        let mut state = self.state.lock();
        Ok(owned_mut(&mut state, owner, id).map(|book| {
            book.read = read;
            book.clone()
        }))
    }

    async fn delete_book(&self, owner: i64, id: i64) -> Result<bool> {
        let mut state = self.state.lock();
        if owned_mut(&mut state, owner, id).is_none() {
            return Ok(false);
        }
        state.books.remove(&id);
        Ok(true)
    }
}

fn owned_mut(state: &mut State, owner: i64, id: i64) -> Option<&mut Book> {
    state.books.get_mut(&id).filter(|book| book.user_id == owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = MemoryStore::new();
        store.create_user("alice", "hash-1").await.unwrap();

        let second = store.create_user("alice", "hash-2").await;
        assert!(matches!(second, Err(CreateUserError::UsernameTaken)));

        let alice = store.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.password_hash, "hash-1");
    }

    #[tokio::test]
    async fn book_queries_filter_by_owner() {
        let store = MemoryStore::new();
        let book = store.insert_book(1, "Dune", "Herbert").await.unwrap();

        assert!(store.get_book(2, book.id).await.unwrap().is_none());
        assert!(store.list_books(2).await.unwrap().is_empty());
        assert!(store.update_book(2, book.id, "X", "Y").await.unwrap().is_none());
        assert!(store.set_book_read(2, book.id, true).await.unwrap().is_none());
        assert!(!store.delete_book(2, book.id).await.unwrap());

        assert_eq!(store.get_book(1, book.id).await.unwrap(), Some(book));
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = MemoryStore::new();
        let first = store.insert_book(1, "A", "B").await.unwrap();
        assert!(store.delete_book(1, first.id).await.unwrap());

        let second = store.insert_book(1, "C", "D").await.unwrap();
        assert!(second.id > first.id);
    }
}
