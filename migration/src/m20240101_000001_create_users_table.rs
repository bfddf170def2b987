use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key()
                    )
                    .col(
                        ColumnDef::new(Users::Key)
                            .string_len(512)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Users::SpotifyId)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Users::DisplayName)
                            .string_len(255),
                    )
                    .col(
                        ColumnDef::new(Users::Email)
                            .string_len(255),
                    )
                    .col(
                        ColumnDef::new(Users::Country)
                            .string_len(255),
                    )
                    .col(
                        ColumnDef::new(Users::Uri)
                            .string_len(255),
                    )
                    .col(
                        ColumnDef::new(Users::Image)
                            .text(),
                    )
                    .col(
                        ColumnDef::new(Users::Product)
                            .string_len(255),
                    )
                    .col(
                        ColumnDef::new(Users::FollowerCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::AccessToken)
                            .text(),
                    )
                    .col(
                        ColumnDef::new(Users::RefreshToken)
                            .text(),
                    )
                    .col(
                        ColumnDef::new(Users::TokenExpires)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Users {
    Table,
    Id,
    Key,
    SpotifyId,
    DisplayName,
    Email,
    Country,
    Uri,
    Image,
    Product,
    FollowerCount,
    AccessToken,
    RefreshToken,
    TokenExpires,
    CreatedAt,
    UpdatedAt,
}
