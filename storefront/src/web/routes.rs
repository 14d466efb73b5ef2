// storefront/src/web/routes.rs

use actix_web::web;

use crate::errors::json_error_handler;

use crate::web::handlers::{
  admin_handlers, catalog_handlers, checkout_handlers, health_handlers, order_handlers, payment_handlers,
  support_handlers, task_handlers, telegram_handlers,
};

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .app_data(web::JsonConfig::default().error_handler(json_error_handler))
      .route("/health", web::get().to(health_handlers::health_handler))
      // Catalog
      .route("/categories", web::get().to(catalog_handlers::list_categories_handler))
      .service(
        web::scope("/jobs")
          .route("", web::get().to(catalog_handlers::list_jobs_handler))
          .route("/{job_id}", web::get().to(catalog_handlers::get_job_handler)),
      )
      // Checkout and payments
      .route("/checkout", web::post().to(checkout_handlers::checkout_handler))
      .service(
        web::scope("/payments/mpesa")
          .route("/stk-push", web::post().to(payment_handlers::stk_push_handler))
          .route("/callback", web::post().to(payment_handlers::mpesa_callback_handler)),
      )
      // Orders
      .service(
        web::scope("/orders")
          .route("/lookup", web::post().to(order_handlers::lookup_orders_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler)),
      )
      // Signed-in buyer
      .service(
        web::scope("/me")
          .route("/orders", web::get().to(order_handlers::my_orders_handler))
          .route("/purchases", web::get().to(task_handlers::my_purchases_handler))
          .route("/purchases/{purchase_id}/tasks", web::get().to(task_handlers::purchase_tasks_handler))
          .route(
            "/purchases/{purchase_id}/tasks/{task_id}/complete",
            web::post().to(task_handlers::complete_task_handler),
          ),
      )
      // Support
      .service(
        web::scope("/support")
          .route("/tickets", web::post().to(support_handlers::create_ticket_handler))
          .route("/tickets", web::get().to(support_handlers::my_tickets_handler)),
      )
      .service(
        web::scope("/telegram")
          .route("/webhook", web::post().to(telegram_handlers::telegram_webhook_handler))
          .route("/setup-webhook", web::get().to(telegram_handlers::setup_webhook_handler)),
      )
      // Back-office
      .service(
        web::scope("/admin")
          .route("/transactions", web::get().to(admin_handlers::list_transactions_handler))
          .route(
            "/transactions/{order_id}/approve",
            web::post().to(admin_handlers::approve_transaction_handler),
          )
          .route(
            "/transactions/{order_id}/reject",
            web::post().to(admin_handlers::reject_transaction_handler),
          )
          .route("/stock", web::get().to(admin_handlers::list_stock_handler))
          .route("/stock/{job_id}", web::put().to(admin_handlers::update_stock_handler))
          .route("/users", web::get().to(admin_handlers::list_users_handler))
          .route("/users/{user_id}", web::delete().to(admin_handlers::delete_user_handler))
          .route("/tickets", web::get().to(admin_handlers::list_tickets_handler))
          .route("/tickets/{ticket_id}/reply", web::post().to(admin_handlers::reply_ticket_handler))
          .route(
            "/tickets/{ticket_id}/status",
            web::put().to(admin_handlers::update_ticket_status_handler),
          ),
      ),
  );
}
