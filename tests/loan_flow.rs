//! Borrow/return lifecycle against a real database.
//!
//! Needs DATABASE_URL pointing at a Postgres server where test databases may
//! be created. Run with: cargo test -- --ignored

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;

use libris_server::{
    config::AppConfig,
    error::AppError,
    models::{
        book::{Book, CreateBook, UpdateBook},
        user::{LoginRequest, RegisterUser, Role, TokenType, UpdateProfile, UpdateUser, UserClaims},
        LoanStatus,
    },
    repository::Repository,
    AppState,
};

struct Fixture {
    state: AppState,
    repository: Repository,
    admin: UserClaims,
}

async fn fixture(pool: PgPool) -> Fixture {
    let state = AppState::new(AppConfig::default(), pool.clone());
    let repository = Repository::new(pool);
    let admin = register(&state, "admin", "admin@example.com", Role::Admin).await;
    Fixture {
        state,
        repository,
        admin,
    }
}

async fn register(state: &AppState, username: &str, email: &str, role: Role) -> UserClaims {
    let user = state
        .services
        .auth
        .register(RegisterUser {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            password: Some("password123".to_string()),
            role: Some(role),
        })
        .await
        .expect("register");
    UserClaims::new(&user, TokenType::Access, Utc::now().timestamp(), 3600)
}

async fn add_book(f: &Fixture, isbn: &str, copies: i32) -> Book {
    f.state
        .services
        .catalog
        .add_book(
            &f.admin,
            CreateBook {
                title: Some("Dune".to_string()),
                author: Some("Frank Herbert".to_string()),
                genre: Some("Science fiction".to_string()),
                isbn: Some(isbn.to_string()),
                published_date: NaiveDate::from_ymd_opt(1965, 8, 1),
                total_copies: Some(copies),
            },
        )
        .await
        .expect("add book")
}

async fn available(f: &Fixture, book_id: i32) -> i32 {
    f.repository
        .books
        .get_by_id(book_id)
        .await
        .expect("book")
        .available_copies
}

async fn active_loans(f: &Fixture, book_id: i32) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE book_id = $1 AND return_date IS NULL")
        .bind(book_id)
        .fetch_one(&f.state.pool)
        .await
        .expect("count")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn two_readers_share_one_book(pool: PgPool) {
    let f = fixture(pool).await;
    let alice = register(&f.state, "alice", "alice@example.com", Role::User).await;
    let bob = register(&f.state, "bob", "bob@example.com", Role::User).await;
    let book = add_book(&f, "9780441013593", 2).await;
    let loans = &f.state.services.loans;

    let first = loans.borrow(&alice, book.id).await.expect("alice borrows");
    assert_eq!(first.book.available_copies, 1);
    assert_eq!(first.status, LoanStatus::Active);
    assert!(first.due_date.is_some());

    loans.borrow(&bob, book.id).await.expect("bob borrows");
    assert_eq!(available(&f, book.id).await, 0);

    let carol = register(&f.state, "carol", "carol@example.com", Role::User).await;
    let err = loans.borrow(&carol, book.id).await.unwrap_err();
    assert!(matches!(err, AppError::NoCopiesAvailable));
    assert_eq!(available(&f, book.id).await, 0);

    let returned = loans.return_book(&alice, book.id).await.expect("alice returns");
    assert_eq!(returned.status, LoanStatus::Returned);
    assert!(returned.return_date.is_some());
    assert_eq!(available(&f, book.id).await, 1);

    let active = loans.all_active_loans(&f.admin).await.expect("admin history");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].user.id, bob.user_id);

    assert!(loans.my_active_loans(&alice).await.expect("history").is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn single_copy_passes_between_readers(pool: PgPool) {
    let f = fixture(pool).await;
    let a = register(&f.state, "reader-a", "a@example.com", Role::User).await;
    let b = register(&f.state, "reader-b", "b@example.com", Role::User).await;
    let book = add_book(&f, "9780441013593", 1).await;
    let loans = &f.state.services.loans;

    let loan = loans.borrow(&a, book.id).await.expect("a borrows");
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(available(&f, book.id).await, 0);

    let err = loans.borrow(&b, book.id).await.unwrap_err();
    assert!(matches!(err, AppError::NoCopiesAvailable));
    assert_eq!(available(&f, book.id).await, 0);

    let returned = loans.return_book(&a, book.id).await.expect("a returns");
    assert_eq!(returned.status, LoanStatus::Returned);
    assert!(returned.return_date.expect("returned") >= returned.borrow_date);
    assert_eq!(available(&f, book.id).await, 1);

    let loan = loans.borrow(&b, book.id).await.expect("b borrows");
    assert_eq!(loan.user.id, b.user_id);
    assert_eq!(available(&f, book.id).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn concurrent_borrows_of_last_copy(pool: PgPool) {
    let f = fixture(pool).await;
    let alice = register(&f.state, "alice", "alice@example.com", Role::User).await;
    let bob = register(&f.state, "bob", "bob@example.com", Role::User).await;
    let book = add_book(&f, "9780441013593", 1).await;
    let loans = &f.state.services.loans;

    let (a, b) = tokio::join!(loans.borrow(&alice, book.id), loans.borrow(&bob, book.id));

    assert_eq!(a.is_ok() as i32 + b.is_ok() as i32, 1);
    let err = a.err().or(b.err()).expect("one borrow fails");
    assert!(matches!(err, AppError::NoCopiesAvailable));
    assert_eq!(available(&f, book.id).await, 0);
    assert_eq!(active_loans(&f, book.id).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn same_book_cannot_be_borrowed_twice(pool: PgPool) {
    let f = fixture(pool).await;
    let alice = register(&f.state, "alice", "alice@example.com", Role::User).await;
    let book = add_book(&f, "9780441013593", 3).await;
    let loans = &f.state.services.loans;

    loans.borrow(&alice, book.id).await.expect("borrow");
    let err = loans.borrow(&alice, book.id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(available(&f, book.id).await, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn return_without_loan_is_not_found(pool: PgPool) {
    let f = fixture(pool).await;
    let alice = register(&f.state, "alice", "alice@example.com", Role::User).await;
    let book = add_book(&f, "9780441013593", 1).await;
    let loans = &f.state.services.loans;

    let err = loans.return_book(&alice, book.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    loans.borrow(&alice, book.id).await.expect("borrow");
    loans.return_book(&alice, book.id).await.expect("return");
    let err = loans.return_book(&alice, book.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(available(&f, book.id).await, 1);

    let err = loans.borrow(&alice, 9999).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn deleting_user_restores_copies(pool: PgPool) {
    let f = fixture(pool).await;
    let alice = register(&f.state, "alice", "alice@example.com", Role::User).await;
    let book = add_book(&f, "9780441013593", 2).await;

    f.state.services.loans.borrow(&alice, book.id).await.expect("borrow");
    assert_eq!(available(&f, book.id).await, 1);

    f.state
        .services
        .users
        .delete_user(&f.admin, alice.user_id)
        .await
        .expect("delete");

    assert_eq!(available(&f, book.id).await, 2);
    assert_eq!(active_loans(&f, book.id).await, 0);

    let err = f.state.services.loans.borrow(&alice, book.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authentication(_)));

    let err = f
        .state
        .services
        .users
        .delete_user(&f.admin, alice.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn deleting_book_removes_its_loans(pool: PgPool) {
    let f = fixture(pool).await;
    let alice = register(&f.state, "alice", "alice@example.com", Role::User).await;
    let book = add_book(&f, "9780441013593", 2).await;

    f.state.services.loans.borrow(&alice, book.id).await.expect("borrow");
    f.state
        .services
        .catalog
        .delete_book(&f.admin, book.id)
        .await
        .expect("delete");

    assert!(f
        .state
        .services
        .loans
        .my_active_loans(&alice)
        .await
        .expect("history")
        .is_empty());
    let err = f.repository.books.get_by_id(book.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn update_book_keeps_copies_consistent(pool: PgPool) {
    let f = fixture(pool).await;
    let alice = register(&f.state, "alice", "alice@example.com", Role::User).await;
    let book = add_book(&f, "9780441013593", 3).await;
    let catalog = &f.state.services.catalog;

    f.state.services.loans.borrow(&alice, book.id).await.expect("borrow");

    let updated = catalog
        .update_book(
            &f.admin,
            book.id,
            UpdateBook {
                total_copies: Some(5),
                ..Default::default()
            },
        )
        .await
        .expect("grow");
    assert_eq!((updated.total_copies, updated.available_copies), (5, 4));

    let err = catalog
        .update_book(
            &f.admin,
            book.id,
            UpdateBook {
                available_copies: Some(6),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(available(&f, book.id).await, 4);

    // in range, but would put alice's copy back on the shelf
    let err = catalog
        .update_book(
            &f.admin,
            book.id,
            UpdateBook {
                available_copies: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = catalog
        .update_book(
            &f.admin,
            book.id,
            UpdateBook {
                total_copies: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let updated = catalog
        .update_book(
            &f.admin,
            book.id,
            UpdateBook {
                available_copies: Some(4),
                ..Default::default()
            },
        )
        .await
        .expect("matching count");
    assert_eq!((updated.total_copies, updated.available_copies), (5, 4));

    let other = add_book(&f, "9780441013594", 1).await;
    let err = catalog
        .update_book(
            &f.admin,
            other.id,
            UpdateBook {
                isbn: Some("9780441013593".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn duplicate_isbn_is_rejected(pool: PgPool) {
    let f = fixture(pool).await;
    add_book(&f, "9780441013593", 1).await;

    let err = f
        .state
        .services
        .catalog
        .add_book(
            &f.admin,
            CreateBook {
                title: Some("Another".to_string()),
                author: Some("Someone".to_string()),
                genre: Some("Drama".to_string()),
                isbn: Some("9780441013593".to_string()),
                published_date: NaiveDate::from_ymd_opt(2001, 1, 1),
                total_copies: Some(1),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(f.state.services.catalog.list_books().await.expect("list").len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn registration_and_login(pool: PgPool) {
    let f = fixture(pool).await;
    let auth = &f.state.services.auth;
    register(&f.state, "alice", "alice@example.com", Role::User).await;

    let err = auth
        .register(RegisterUser {
            username: Some("alice2".to_string()),
            email: Some("ALICE@example.com".to_string()),
            password: Some("password123".to_string()),
            role: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let (user, tokens) = auth
        .login(LoginRequest {
            email: Some("alice@example.com".to_string()),
            password: Some("password123".to_string()),
        })
        .await
        .expect("login");
    assert_eq!(user.role, Role::User);
    assert_eq!(auth.authorize(&tokens.access_token).expect("access").user_id, user.id);
    assert!(auth.authorize(&tokens.refresh_token).is_err());

    let access = auth.refresh(&tokens.refresh_token).await.expect("refresh");
    assert_eq!(auth.authorize(&access).expect("refreshed").user_id, user.id);

    let err = auth
        .login(LoginRequest {
            email: Some("alice@example.com".to_string()),
            password: Some("wrong-password".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    let err = auth
        .login(LoginRequest {
            email: Some("nobody@example.com".to_string()),
            password: Some("password123".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn deactivated_account_cannot_log_in_or_borrow(pool: PgPool) {
    let f = fixture(pool).await;
    let alice = register(&f.state, "alice", "alice@example.com", Role::User).await;
    let book = add_book(&f, "9780441013593", 1).await;

    let user = f
        .state
        .services
        .users
        .update_user(
            &f.admin,
            alice.user_id,
            UpdateUser {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("deactivate");
    assert!(!user.is_active);

    let err = f
        .state
        .services
        .auth
        .login(LoginRequest {
            email: Some("alice@example.com".to_string()),
            password: Some("password123".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountDeactivated));

    let err = f.state.services.loans.borrow(&alice, book.id).await.unwrap_err();
    assert!(matches!(err, AppError::AccountDeactivated));
    assert_eq!(available(&f, book.id).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn profile_update(pool: PgPool) {
    let f = fixture(pool).await;
    let alice = register(&f.state, "alice", "alice@example.com", Role::User).await;
    let users = &f.state.services.users;

    let err = users
        .update_profile(
            &alice,
            UpdateProfile {
                email: Some("admin@example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = users
        .update_profile(
            &alice,
            UpdateProfile {
                current_password: Some("nope-nope".to_string()),
                new_password: Some("newpassword1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let user = users
        .update_profile(
            &alice,
            UpdateProfile {
                username: Some("alice-renamed".to_string()),
                current_password: Some("password123".to_string()),
                new_password: Some("newpassword1".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(user.username, "alice-renamed");

    f.state
        .services
        .auth
        .login(LoginRequest {
            email: Some("alice@example.com".to_string()),
            password: Some("newpassword1".to_string()),
        })
        .await
        .expect("login with new password");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn admin_lists_users(pool: PgPool) {
    let f = fixture(pool).await;
    let alice = register(&f.state, "alice", "alice@example.com", Role::User).await;

    let users = f.state.services.users.list_users(&f.admin).await.expect("list");
    assert_eq!(users.len(), 2);

    let err = f.state.services.users.list_users(&alice).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn lent_copy_cannot_be_put_back_by_update(pool: PgPool) {
    let f = fixture(pool).await;
    let alice = register(&f.state, "alice", "alice@example.com", Role::User).await;
    let bob = register(&f.state, "bob", "bob@example.com", Role::User).await;
    let book = add_book(&f, "9780441013593", 1).await;
    let loans = &f.state.services.loans;

    loans.borrow(&alice, book.id).await.expect("alice borrows");

    let err = f
        .state
        .services
        .catalog
        .update_book(
            &f.admin,
            book.id,
            UpdateBook {
                available_copies: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(available(&f, book.id).await, 0);

    let err = loans.borrow(&bob, book.id).await.unwrap_err();
    assert!(matches!(err, AppError::NoCopiesAvailable));

    loans.return_book(&alice, book.id).await.expect("alice returns");
    assert_eq!(available(&f, book.id).await, 1);
    assert_eq!(active_loans(&f, book.id).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn demoted_admin_token_loses_admin_rights(pool: PgPool) {
    let f = fixture(pool).await;
    let second = register(&f.state, "second", "second@example.com", Role::Admin).await;
    let users = &f.state.services.users;

    users.list_users(&second).await.expect("admin lists users");

    users
        .update_user(
            &f.admin,
            second.user_id,
            UpdateUser {
                role: Some(Role::User),
                ..Default::default()
            },
        )
        .await
        .expect("demote");

    // claims still say Admin
    let err = users.list_users(&second).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
    let err = f
        .state
        .services
        .loans
        .all_active_loans(&second)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn deactivated_admin_token_is_refused(pool: PgPool) {
    let f = fixture(pool).await;
    let second = register(&f.state, "second", "second@example.com", Role::Admin).await;

    f.state
        .services
        .users
        .update_user(
            &f.admin,
            second.user_id,
            UpdateUser {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("deactivate");

    let err = f
        .state
        .services
        .catalog
        .delete_book(&second, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountDeactivated));

    let err = f.state.services.users.get_profile(&second).await.unwrap_err();
    assert!(matches!(err, AppError::AccountDeactivated));
}
