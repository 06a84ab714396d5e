//! Migration: Create matchings table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Matchings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Matchings::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Matchings::MeId).uuid().not_null())
                    .col(ColumnDef::new(Matchings::PartnerId).uuid().not_null())
                    .col(
                        ColumnDef::new(Matchings::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Matchings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Matchings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    // Removing a user removes every matching it takes part in
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_matchings_me_id")
                            .from(Matchings::Table, Matchings::MeId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_matchings_partner_id")
                            .from(Matchings::Table, Matchings::PartnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_matchings_participants")
                    .table(Matchings::Table)
                    .col(Matchings::MeId)
                    .col(Matchings::PartnerId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_matchings_partner_id")
                    .table(Matchings::Table)
                    .col(Matchings::PartnerId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Matchings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Matchings {
    Table,
    Id,
    MeId,
    PartnerId,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
