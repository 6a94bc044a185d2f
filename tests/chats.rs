mod common;

use tutorchat::{db::ParticipantKind, directory::SearchFilter, AppError};

#[tokio::test]
async fn empty_chat_list_is_not_found_for_both_roles() {
    let pool = common::test_pool().await;
    let chat = common::service(&pool);
    let student = common::student(&pool, "Sam").await;
    let tutor = common::tutor(&pool, "Tess").await;

    let filter = SearchFilter::default();
    assert!(matches!(chat.get_chats(&filter, &student).await, Err(AppError::NotFound(_))));
    assert!(matches!(chat.get_tutor_chats(&filter, &tutor).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn only_tutor_listing_validates_id_format() {
    let pool = common::test_pool().await;
    let chat = common::service(&pool);

    let filter = SearchFilter::default();
    assert!(matches!(chat.get_tutor_chats(&filter, "12345").await, Err(AppError::BadRequest(_))));
    assert!(matches!(chat.get_chats(&filter, "12345").await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn chat_summaries_carry_unread_and_last_message() {
    let pool = common::test_pool().await;
    let chat = common::service(&pool);
    let student = common::student(&pool, "Sam Student").await;
    let ada = common::tutor(&pool, "Ada Lovelace").await;
    let grace = common::tutor(&pool, "Grace Hopper").await;

    let with_ada = chat.get_room(&ada, &student).await.unwrap();
    let with_grace = chat.get_room(&grace, &student).await.unwrap();

    chat.send_message(common::text(&with_ada.id, &ada, "welcome", 1)).await.unwrap();
    chat.send_message(common::text(&with_ada.id, &ada, "lesson at 5?", 2)).await.unwrap();
    chat.send_message(common::text(&with_grace.id, &student, "question", 3)).await.unwrap();

    let chats = chat.get_chats(&SearchFilter::default(), &student).await.unwrap();
    assert_eq!(chats.len(), 2);

    let ada_chat = chats.iter().find(|c| c.room_id == with_ada.id).unwrap();
    assert_eq!(ada_chat.counterpart_id, ada);
    assert_eq!(ada_chat.counterpart_display_name, "Ada Lovelace");
    assert_eq!(ada_chat.unread_count, 2);
    assert_eq!(ada_chat.last_message_text.as_deref(), Some("lesson at 5?"));

    let grace_chat = chats.iter().find(|c| c.room_id == with_grace.id).unwrap();
    assert_eq!(grace_chat.unread_count, 0);

    let filtered = chat.get_chats(&SearchFilter::new("hopp"), &student).await.unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].room_id, with_grace.id);

    let tutor_view = chat.get_tutor_chats(&SearchFilter::default(), &ada).await.unwrap();
    assert_eq!(tutor_view.len(), 1);
    assert_eq!(tutor_view[0].counterpart_display_name, "Sam Student");
    assert_eq!(tutor_view[0].unread_count, 0);
}

#[tokio::test]
async fn contacts_merge_both_kinds_and_skip_caller() {
    let pool = common::test_pool().await;
    let chat = common::service(&pool);
    let me = common::student(&pool, "Sam Student").await;
    common::student(&pool, "Samira Student").await;
    common::tutor(&pool, "Sam Tutor").await;
    common::tutor(&pool, "Grace Hopper").await;
    common::seed(&pool, ParticipantKind::Tutor, "Sam Blocked", true).await;

    let contacts = chat.get_contacts(&SearchFilter::new("sam"), Some(&me)).await.unwrap();
    let names: Vec<_> = contacts.iter().map(|c| c.display_name.as_str()).collect();
    assert_eq!(names, ["Samira Student", "Sam Tutor"]);
    assert_eq!(contacts[0].kind, Some(ParticipantKind::Student));
    assert_eq!(contacts[1].kind, Some(ParticipantKind::Tutor));

    assert!(matches!(chat.get_contacts(&SearchFilter::new("zzz"), Some(&me)).await, Err(AppError::NotFound(_))));
    assert!(matches!(chat.get_contacts(&SearchFilter::default(), None).await, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn conversation_view_puts_caller_first_and_names_counterpart() {
    let pool = common::test_pool().await;
    let chat = common::service(&pool);
    let student = common::student(&pool, "Sam Student").await;
    let tutor = common::tutor(&pool, "Tess Tutor").await;

    let room = chat.get_room(&tutor, &student).await.unwrap();
    let sent = chat.send_message(common::text(&room.id, &tutor, "hi", 5)).await.unwrap().0;

    let view = chat.get_room_message(&room.id, &student).await.unwrap();
    assert_eq!(view.id, room.id);
    assert_eq!(view.participants[0].id, student);
    assert_eq!(view.participants[1].id, tutor);
    assert_eq!(view.name, "Tess Tutor");
    assert!(view.profile_picture.is_some());
    assert_eq!(view.last_message.as_ref().map(|m| &m.id), Some(&sent.id));

    // the other side sees the mirror image
    let mirror = chat.get_room_message(&room.id, &tutor).await.unwrap();
    assert_eq!(mirror.name, "Sam Student");
}

#[tokio::test]
async fn conversation_view_validates_and_reports_missing_rooms() {
    let pool = common::test_pool().await;
    let chat = common::service(&pool);
    let student = common::student(&pool, "Sam").await;

    assert!(matches!(chat.get_room_message("nope", &student).await, Err(AppError::BadRequest(_))));
    let missing = uuid::Uuid::now_v7().to_string();
    assert!(matches!(chat.get_room_message(&missing, &student).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn malformed_stored_participants_are_internal() {
    let pool = common::test_pool().await;
    let chat = common::service(&pool);
    let room_id = uuid::Uuid::now_v7().to_string();
    let student = common::student(&pool, "Sam").await;

    sqlx::query(
        "INSERT INTO rooms (id,participant_low,low_kind,participant_high,high_kind,created_at,updated_at) \
         VALUES (?,'','student',?,'student',0,0)",
    )
    .bind(&room_id)
    .bind(&student)
    .execute(&pool)
    .await
    .unwrap();

    assert!(matches!(chat.get_room_message(&room_id, &student).await, Err(AppError::Internal(_))));
}

#[tokio::test]
async fn vanished_counterpart_falls_back_to_their_own_cached_label() {
    let pool = common::test_pool().await;
    let chat = common::service(&pool);
    let student = common::student(&pool, "Sam Student").await;
    let tutor = common::tutor(&pool, "Tess Tutor").await;

    // the tutor opens the room, so the room-level display fields describe the student
    let room = chat.get_room(&student, &tutor).await.unwrap();
    chat.send_message(common::text(&room.id, &tutor, "hi", 1)).await.unwrap();
    sqlx::query("DELETE FROM tutors WHERE id=?").bind(&tutor).execute(&pool).await.unwrap();

    let view = chat.get_room_message(&room.id, &student).await.unwrap();
    assert_eq!(view.name, "Tess Tutor");
    assert_eq!(view.participants[1].id, tutor);
    assert_eq!(view.participants[1].display_name, "Tess Tutor");

    let chats = chat.get_chats(&SearchFilter::default(), &student).await.unwrap();
    assert_eq!(chats[0].counterpart_display_name, "Tess Tutor");
}

#[tokio::test]
async fn reads_refresh_the_cached_label() {
    let pool = common::test_pool().await;
    let chat = common::service(&pool);
    let student = common::student(&pool, "Sam Student").await;
    let tutor = common::tutor(&pool, "Tess Tutor").await;
    let room = chat.get_room(&student, &tutor).await.unwrap();

    sqlx::query("UPDATE students SET name='Samantha Student' WHERE id=?")
        .bind(&student)
        .execute(&pool)
        .await
        .unwrap();
    assert_eq!(chat.get_room_message(&room.id, &tutor).await.unwrap().name, "Samantha Student");

    sqlx::query("DELETE FROM students WHERE id=?").bind(&student).execute(&pool).await.unwrap();
    let view = chat.get_room_message(&room.id, &tutor).await.unwrap();
    assert_eq!(view.name, "Samantha Student");
    assert_eq!(view.participants[0].display_name, "Tess Tutor");
}
