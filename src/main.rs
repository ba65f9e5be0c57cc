use clap::Parser;
use lottery_keeper::{Ctx, Env, launch, setup_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = Env::parse();
    let ctx = Ctx::load(&env)?;

    setup_tracing(&ctx.log_level);

    launch(ctx).await
}
