use crate::context::AppContext;

pub(crate) fn run_delete(ctx: &AppContext, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !ctx.history.delete(id)? {
        return Err(format!("no backup record with id '{id}'").into());
    }
    println!("Deleted backup record {id}.");
    Ok(())
}
