//! `console` for detector code, forwarded to `tracing` under target `detector`

use rquickjs::{convert::Coerced, function::Rest, Ctx, Function, Object};

fn line(args: Rest<Coerced<String>>) -> String {
    args.0
        .into_iter()
        .map(|Coerced(text)| text)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn install(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;

    console.set(
        "log",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::info!(target: "detector", "{}", line(args));
        })?,
    )?;
    console.set(
        "info",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::info!(target: "detector", "{}", line(args));
        })?,
    )?;
    console.set(
        "debug",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::debug!(target: "detector", "{}", line(args));
        })?,
    )?;
    console.set(
        "warn",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::warn!(target: "detector", "{}", line(args));
        })?,
    )?;
    console.set(
        "error",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::error!(target: "detector", "{}", line(args));
        })?,
    )?;

    ctx.globals().set("console", console)?;
    Ok(())
}
