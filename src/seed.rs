use rust_decimal::Decimal;
use sea_orm::*;
use std::str::FromStr;

use crate::auth::hash_password;
use crate::models::{book, category, user};

/// Seed a demo admin, a demo seller and a handful of listings. Safe to run
/// on an existing database: it bails out once users are present.
pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    if user::Entity::find().count(db).await? > 0 {
        return Ok(());
    }

    let now = chrono::Utc::now().to_rfc3339();

    let admin_password = hash_password("admin").unwrap();
    let seller_password = hash_password("seller").unwrap();

    let admin = user::ActiveModel {
        username: Set("admin".to_owned()),
        email: Set("admin@bookstall.local".to_owned()),
        password_hash: Set(admin_password),
        registration_date: Set(now.clone()),
        status: Set("active".to_owned()),
        role: Set("admin".to_owned()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let seller = user::ActiveModel {
        username: Set("seller".to_owned()),
        email: Set("seller@bookstall.local".to_owned()),
        password_hash: Set(seller_password),
        registration_date: Set(now.clone()),
        status: Set("active".to_owned()),
        role: Set("user".to_owned()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Seeded users {} and {}", admin.username, seller.username);

    let classics = category::Entity::find()
        .filter(category::Column::Name.eq("Classics"))
        .one(db)
        .await?
        .map(|c| c.id);
    let scifi = category::Entity::find()
        .filter(category::Column::Name.eq("Science Fiction"))
        .one(db)
        .await?
        .map(|c| c.id);

    let listings = [
        ("The Master and Margarita", "Mikhail Bulgakov", 1967, "8.50", classics),
        ("Dune", "Frank Herbert", 1965, "12.00", scifi),
        ("Roadside Picnic", "Arkady Strugatsky", 1972, "6.75", scifi),
    ];

    for (title, author, year, price, category_id) in listings {
        book::ActiveModel {
            title: Set(title.to_owned()),
            author: Set(author.to_owned()),
            year: Set(Some(year)),
            description: Set(None),
            price: Set(Decimal::from_str(price).unwrap()),
            condition: Set("good".to_owned()),
            owner_id: Set(seller.id),
            category_id: Set(category_id),
            is_available: Set(true),
            created_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}
