//! Tests for database repository and profile operations.

use tempfile::NamedTempFile;

use parlor_games::{
    GameCategory, GameOutcome, GameRepository, Identity, IdentityVerifier, NewGameStat,
    OutcomeRecorder, ProfileService,
};

/// Creates a temporary database file with schema applied, returns the file
/// handle (must stay in scope to keep the file alive) and a ready repository.
fn setup_test_db() -> (NamedTempFile, GameRepository) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let repo = GameRepository::new(db_path).expect("Failed to create repository");
    repo.run_migrations().expect("Migrations failed");
    (db_file, repo)
}

fn record(repo: &GameRepository, user_id: i32, outcome: GameOutcome, room: &str) {
    let stat = NewGameStat::new(
        user_id,
        "ludo".to_string(),
        outcome.to_db_string().to_string(),
        room.to_string(),
    );
    repo.record_game(stat).expect("Record failed");
}

#[test]
fn test_create_user() {
    let (_db, repo) = setup_test_db();
    let user = repo
        .create_user("Alice".to_string(), "tok-alice".to_string())
        .expect("Create failed");
    assert_eq!(user.display_name(), "Alice");
    assert_eq!(user.token(), "tok-alice");
    assert!(*user.id() > 0);
}

#[test]
fn test_duplicate_name_or_token_fails() {
    let (_db, repo) = setup_test_db();
    repo.create_user("Bob".to_string(), "tok-1".to_string())
        .expect("First create failed");
    assert!(repo.create_user("Bob".to_string(), "tok-2".to_string()).is_err());
    assert!(repo.create_user("Rob".to_string(), "tok-1".to_string()).is_err());
}

#[test]
fn test_lookup_by_name_and_token() {
    let (_db, repo) = setup_test_db();
    repo.create_user("Carol".to_string(), "tok-carol".to_string())
        .expect("Create failed");

    let by_name = repo.get_user_by_name("Carol").expect("Query failed");
    assert_eq!(by_name.expect("missing").token(), "tok-carol");

    let by_token = repo.get_user_by_token("tok-carol").expect("Query failed");
    assert_eq!(by_token.expect("missing").display_name(), "Carol");

    assert!(repo.get_user_by_name("Nobody").expect("Query failed").is_none());
    assert!(repo.get_user_by_token("nope").expect("Query failed").is_none());
}

#[test]
fn test_list_users_ordered_by_creation() {
    let (_db, repo) = setup_test_db();
    for name in ["Alpha", "Beta", "Gamma"] {
        repo.create_user(name.to_string(), format!("tok-{name}"))
            .expect("Create failed");
    }

    let users = repo.list_users().expect("List failed");
    let names: Vec<_> = users.iter().map(|u| u.display_name().as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);
}

#[test]
fn test_record_game() {
    let (_db, repo) = setup_test_db();
    let user = repo
        .create_user("Dave".to_string(), "tok-dave".to_string())
        .expect("Create failed");

    record(&repo, *user.id(), GameOutcome::Win, "ludo-1");

    let stats = repo.get_user_stats(*user.id()).expect("Stats failed");
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].room_id(), "ludo-1");
    assert_eq!(stats[0].game_type(), "ludo");
    assert_eq!(stats[0].parse_outcome().expect("bad outcome"), GameOutcome::Win);
}

#[test]
fn test_get_aggregated_stats() {
    let (_db, repo) = setup_test_db();
    let user = repo
        .create_user("Frank".to_string(), "tok-frank".to_string())
        .expect("Create failed");

    for i in 0..3 {
        record(&repo, *user.id(), GameOutcome::Win, &format!("ludo-w{i}"));
    }
    record(&repo, *user.id(), GameOutcome::Loss, "ludo-l");

    let agg = repo
        .get_aggregated_stats(*user.id())
        .expect("Aggregation failed");
    assert_eq!(*agg.total_games(), 4);
    assert_eq!(*agg.wins(), 3);
    assert_eq!(*agg.losses(), 1);
    assert!((agg.win_rate() - 75.0).abs() < 0.001);
}

#[test]
fn test_get_aggregated_stats_no_games() {
    let (_db, repo) = setup_test_db();
    let user = repo
        .create_user("Grace".to_string(), "tok-grace".to_string())
        .expect("Create failed");

    let agg = repo
        .get_aggregated_stats(*user.id())
        .expect("Aggregation failed");
    assert_eq!(*agg.total_games(), 0);
    assert_eq!(agg.win_rate(), 0.0);
}

#[test]
fn test_profile_service_verifies_registered_token() {
    let (_db, repo) = setup_test_db();
    let profiles = ProfileService::new(repo);
    let user = profiles
        .register_user("Hank".to_string())
        .expect("Register failed");
    assert_eq!(user.token().len(), 32);

    let identity = profiles
        .verify_identity(user.token())
        .expect("Lookup failed")
        .expect("Token not recognized");
    assert_eq!(identity, Identity::new(*user.id(), "Hank".to_string()));

    assert!(profiles.verify_identity("forged").expect("Lookup failed").is_none());
}

#[test]
fn test_profile_service_records_outcomes() {
    let (_db, repo) = setup_test_db();
    let profiles = ProfileService::new(repo);
    let user = profiles
        .register_user("Ivy".to_string())
        .expect("Register failed");
    let identity = Identity::new(*user.id(), "Ivy".to_string());

    profiles
        .record_outcome(&identity, GameCategory::Ludo, "ludo-7", true)
        .expect("Record failed");
    profiles
        .record_outcome(&identity, GameCategory::Ludo, "ludo-8", false)
        .expect("Record failed");

    let stats = profiles.get_stats(*user.id()).expect("Stats failed");
    assert_eq!(*stats.wins(), 1);
    assert_eq!(*stats.losses(), 1);
    assert_eq!(profiles.get_history(*user.id()).expect("History failed").len(), 2);
}

#[test]
fn test_open_applies_migrations() {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let path = db_file.path().to_str().expect("Invalid path");
    let profiles = ProfileService::open(path).expect("Open failed");
    assert!(profiles.find_user("Nobody").expect("Query failed").is_none());
    // Reopening is a no-op for an up-to-date schema.
    ProfileService::open(path).expect("Reopen failed");
}
